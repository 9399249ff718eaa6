//! Epsilon elimination: ENFA -> NFA.
//!
//! Worklist fixpoint over a frontier of candidate transitions (not over
//! states). The frontier is semantically an unordered set; membership checks
//! before every insertion make the fixpoint independent of pop order, and the
//! concrete implementation pops in sorted triple order so fixtures are
//! reproducible.

use std::collections::{BTreeMap, BTreeSet};

use crate::automaton::{Automaton, StateId, SymbolMap};

type Triple = (StateId, String, StateId);

#[derive(Clone, Copy)]
enum PopOrder {
    Smallest,
    Largest,
}

impl Automaton {
    /// Produces an automaton over the same alphabet accepting the same
    /// language, with the epsilon transitions collapsed away. Assumes a
    /// validated ENFA (`epsilon` set when epsilon transitions are present);
    /// malformed input is a caller error and is not re-checked here.
    pub fn eliminate_epsilon(&self) -> Automaton {
        fixpoint(self, PopOrder::Smallest)
    }
}

fn fixpoint(enfa: &Automaton, order: PopOrder) -> Automaton {
    let Some(start) = enfa.initial_state.clone() else {
        // degenerate empty automaton
        let mut out = Automaton::empty();
        out.alphabet = enfa.alphabet.clone();
        return out;
    };
    let epsilon = enfa.epsilon.as_deref();

    let mut out_states: BTreeSet<StateId> = [start.clone()].into();
    let mut out_relation: BTreeSet<Triple> = BTreeSet::new();
    // epsilon triples already processed; never emitted, only used for dedup
    let mut seen_epsilon: BTreeSet<Triple> = BTreeSet::new();
    let mut accepting: BTreeSet<StateId> = BTreeSet::new();
    if enfa.is_accepting(&start) {
        accepting.insert(start.clone());
    }

    let mut worklist: BTreeSet<Triple> = enfa
        .transitions_from(&start)
        .flat_map(|(symbol, targets)| {
            targets
                .iter()
                .map(|t| (start.clone(), symbol.clone(), t.clone()))
        })
        .collect();

    let mut processed = 0usize;
    while let Some(triple) = pop(&mut worklist, order) {
        processed += 1;
        let (a1, symbol, a2) = triple;

        if Some(symbol.as_str()) != epsilon {
            out_states.insert(a2.clone());
            out_relation.insert((a1.clone(), symbol.clone(), a2.clone()));
            if enfa.is_accepting(&a2) {
                accepting.insert(a2.clone());
            }

            // epsilon-successors of a2 collapse into the same labeled edge
            // from a1
            if let Some(eps) = epsilon {
                for a3 in enfa.successors(&a2, eps) {
                    let candidate = (a1.clone(), symbol.clone(), a3.clone());
                    if !out_relation.contains(&candidate) {
                        worklist.insert(candidate);
                    }
                }
            }
            // traversal continues from the newly discovered state
            for (x, targets) in enfa.transitions_from(&a2) {
                if Some(x.as_str()) == epsilon {
                    continue;
                }
                for a3 in targets {
                    let candidate = (a2.clone(), x.clone(), a3.clone());
                    if !out_relation.contains(&candidate) {
                        worklist.insert(candidate);
                    }
                }
            }
        } else {
            seen_epsilon.insert((a1.clone(), symbol, a2.clone()));
            // epsilon-reachable acceptance propagates to the start state
            if enfa.is_accepting(&a2) {
                accepting.insert(start.clone());
            }

            for (beta, targets) in enfa.transitions_from(&a2) {
                for a3 in targets {
                    let candidate = (a1.clone(), beta.clone(), a3.clone());
                    if !out_relation.contains(&candidate) && !seen_epsilon.contains(&candidate) {
                        worklist.insert(candidate);
                    }
                }
            }
        }
    }
    log::debug!(
        "epsilon elimination: {} triples processed, {} output edges",
        processed,
        out_relation.len()
    );

    let mut transitions: BTreeMap<StateId, SymbolMap> = BTreeMap::new();
    for (from, symbol, to) in out_relation {
        transitions
            .entry(from)
            .or_default()
            .entry(symbol)
            .or_default()
            .insert(to);
    }
    Automaton {
        states: out_states,
        alphabet: enfa.alphabet.clone(),
        transitions,
        initial_state: Some(start),
        accepting_states: accepting,
        epsilon: None,
    }
}

fn pop(worklist: &mut BTreeSet<Triple>, order: PopOrder) -> Option<Triple> {
    let next = match order {
        PopOrder::Smallest => worklist.iter().next()?.clone(),
        PopOrder::Largest => worklist.iter().next_back()?.clone(),
    };
    worklist.take(&next)
}

#[cfg(test)]
fn chain_enfa() -> Automaton {
    // 0 -x-> 0, 1 -y-> 1, 2 -z-> 2, 0 -eps-> 1, 1 -eps-> 2, accepting {2}
    let mut enfa = Automaton::empty();
    enfa.alphabet = ["x".to_string(), "y".to_string(), "z".to_string()].into();
    enfa.epsilon = Some("eps".to_string());
    enfa.add_transition(StateId::atom("0"), "x", StateId::atom("0"));
    enfa.add_transition(StateId::atom("1"), "y", StateId::atom("1"));
    enfa.add_transition(StateId::atom("2"), "z", StateId::atom("2"));
    enfa.add_transition(StateId::atom("0"), "eps", StateId::atom("1"));
    enfa.add_transition(StateId::atom("1"), "eps", StateId::atom("2"));
    enfa.initial_state = Some(StateId::atom("0"));
    enfa.accepting_states = [StateId::atom("2")].into();
    enfa
}

#[cfg(test)]
fn relation_of(nfa: &Automaton) -> BTreeSet<Triple> {
    nfa.transitions
        .iter()
        .flat_map(|(from, by_symbol)| {
            by_symbol.iter().flat_map(move |(symbol, targets)| {
                targets
                    .iter()
                    .map(move |to| (from.clone(), symbol.clone(), to.clone()))
            })
        })
        .collect()
}

#[test]
fn test_eliminate_epsilon_chain() {
    let nfa = chain_enfa().eliminate_epsilon();
    assert_eq!(nfa.epsilon, None);
    assert_eq!(nfa.initial_state, Some(StateId::atom("0")));
    // 0 becomes accepting: the accepting state 2 is epsilon-reachable from 0
    assert_eq!(
        nfa.accepting_states,
        [StateId::atom("0"), StateId::atom("2")].into()
    );

    let t = |a: &str, x: &str, b: &str| (StateId::atom(a), x.to_string(), StateId::atom(b));
    let expected: BTreeSet<Triple> = [
        t("0", "x", "0"),
        t("0", "x", "1"),
        t("0", "x", "2"),
        t("0", "y", "1"),
        t("0", "y", "2"),
        t("0", "z", "2"),
        t("1", "y", "1"),
        t("1", "y", "2"),
        t("2", "z", "2"),
    ]
    .into();
    assert_eq!(relation_of(&nfa), expected);
    // no epsilon edges survive
    assert!(!relation_of(&nfa).iter().any(|(_, x, _)| x == "eps"));
}

#[test]
fn test_fixpoint_is_pop_order_independent() {
    let enfa = chain_enfa();
    let smallest = fixpoint(&enfa, PopOrder::Smallest);
    let largest = fixpoint(&enfa, PopOrder::Largest);
    assert_eq!(relation_of(&smallest), relation_of(&largest));
    assert_eq!(smallest.accepting_states, largest.accepting_states);
    assert_eq!(smallest.states, largest.states);
}

#[test]
fn test_accepting_initial_state_is_kept() {
    let mut enfa = Automaton::empty();
    enfa.alphabet = ["a".to_string()].into();
    enfa.epsilon = Some("eps".to_string());
    enfa.add_transition(StateId::atom("q0"), "a", StateId::atom("q1"));
    enfa.initial_state = Some(StateId::atom("q0"));
    enfa.accepting_states = [StateId::atom("q0")].into();
    let nfa = enfa.eliminate_epsilon();
    assert!(nfa.is_accepting(&StateId::atom("q0")));
}

#[test]
fn test_eliminate_epsilon_empty_automaton() {
    let nfa = Automaton::empty().eliminate_epsilon();
    assert!(nfa.states.is_empty());
    assert!(nfa.transitions.is_empty());
    assert_eq!(nfa.initial_state, None);
}
