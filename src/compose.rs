//! Synchronous product of two Büchi automata.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::automaton::{Automaton, StateId, SymbolMap};

impl Automaton {
    /// Synchronous product over the intersected alphabet. Symbols absent
    /// from one operand cannot synchronize and are dropped, not treated as
    /// wildcards. The state set is the full cross product, not just the
    /// reachable part; unreachable composite states stay in the structure
    /// and contribute nothing at acceptance-checking time.
    ///
    /// Accepting states are the cross product of the operands' accepting
    /// sets, i.e. "both components accepting simultaneously". This is a
    /// known approximation of Büchi intersection, not the generalized
    /// counter-based construction.
    pub fn compose(&self, other: &Automaton) -> Automaton {
        let alphabet: BTreeSet<String> = self
            .alphabet
            .intersection(&other.alphabet)
            .cloned()
            .collect();

        let states: BTreeSet<StateId> = self
            .states
            .iter()
            .cartesian_product(other.states.iter())
            .map(|(s1, s2)| StateId::pair(s1.clone(), s2.clone()))
            .collect();

        let mut transitions: BTreeMap<StateId, SymbolMap> = BTreeMap::new();
        for (s1, s2) in self.states.iter().cartesian_product(other.states.iter()) {
            for symbol in &alphabet {
                let targets: BTreeSet<StateId> = self
                    .successors(s1, symbol)
                    .cartesian_product(other.successors(s2, symbol).collect_vec())
                    .map(|(t1, t2)| StateId::pair(t1.clone(), t2.clone()))
                    .collect();
                if !targets.is_empty() {
                    transitions
                        .entry(StateId::pair(s1.clone(), s2.clone()))
                        .or_default()
                        .insert(symbol.clone(), targets);
                }
            }
        }

        let initial_state = match (&self.initial_state, &other.initial_state) {
            (Some(i1), Some(i2)) => Some(StateId::pair(i1.clone(), i2.clone())),
            _ => None,
        };
        let accepting_states: BTreeSet<StateId> = self
            .accepting_states
            .iter()
            .cartesian_product(other.accepting_states.iter())
            .map(|(f1, f2)| StateId::pair(f1.clone(), f2.clone()))
            .collect();

        log::debug!(
            "product: {}x{} states, {} composite transitions",
            self.states.len(),
            other.states.len(),
            transitions.len()
        );
        Automaton {
            states,
            alphabet,
            transitions,
            initial_state,
            accepting_states,
            epsilon: None,
        }
    }
}

#[cfg(test)]
fn ends_in_a(prefix: &str) -> Automaton {
    // two states, accepts strings ending in `a`, self-loop reset on `b`
    let s0 = StateId::atom(format!("{}0", prefix));
    let s1 = StateId::atom(format!("{}1", prefix));
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string(), "b".to_string()].into();
    automaton.add_transition(s0.clone(), "a", s1.clone());
    automaton.add_transition(s0.clone(), "b", s0.clone());
    automaton.add_transition(s1.clone(), "a", s1.clone());
    automaton.add_transition(s1.clone(), "b", s0.clone());
    automaton.initial_state = Some(s0);
    automaton.accepting_states = [s1].into();
    automaton
}

#[test]
fn test_product_of_ends_in_a() {
    let a = ends_in_a("p");
    let b = ends_in_a("q");
    let product = a.compose(&b);

    assert_eq!(product.states.len(), 4);
    assert_eq!(
        product.initial_state,
        Some(StateId::pair(StateId::atom("p0"), StateId::atom("q0")))
    );
    // accepting set is exactly the cross product of the accepting singletons
    assert_eq!(
        product.accepting_states,
        [StateId::pair(StateId::atom("p1"), StateId::atom("q1"))].into()
    );

    // every composite transition equals the independent per-component result
    for s1 in &a.states {
        for s2 in &b.states {
            let composite = StateId::pair(s1.clone(), s2.clone());
            for symbol in &product.alphabet {
                let expected: BTreeSet<StateId> = a
                    .successors(s1, symbol)
                    .flat_map(|t1| {
                        b.successors(s2, symbol)
                            .map(move |t2| StateId::pair(t1.clone(), t2.clone()))
                    })
                    .collect();
                let actual: BTreeSet<StateId> =
                    product.successors(&composite, symbol).cloned().collect();
                assert_eq!(actual, expected, "at {} on {}", composite, symbol);
            }
        }
    }
}

#[test]
fn test_product_alphabet_is_intersection() {
    let mut a = ends_in_a("p");
    a.alphabet.insert("c".to_string());
    a.add_transition(StateId::atom("p0"), "c", StateId::atom("p1"));
    let b = ends_in_a("q");
    let product = a.compose(&b);
    assert_eq!(product.alphabet, b.alphabet);
    // `c` cannot synchronize, so no composite edge carries it
    assert!(product
        .transitions
        .values()
        .all(|by_symbol| !by_symbol.contains_key("c")));
}

#[test]
fn test_product_includes_unreachable_composites() {
    let a = ends_in_a("p");
    let b = ends_in_a("q");
    let product = a.compose(&b);
    // (p1,q0) is not reachable from (p0,q0) but composition is total
    assert!(product
        .states
        .contains(&StateId::pair(StateId::atom("p1"), StateId::atom("q0"))));
}

#[test]
fn test_product_with_empty_automaton() {
    let a = ends_in_a("p");
    let product = a.compose(&Automaton::empty());
    assert!(product.states.is_empty());
    assert_eq!(product.initial_state, None);
    assert!(product.accepting_states.is_empty());
}
