//! Structural concatenation `L(A)·L(B)` built from three cooperating views:
//! entry/exit marking (`Bipole`), iteration closure (`StrongIteration`) and
//! the handoff product (`Concatenation`). No epsilon transitions are
//! introduced at any stage.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::automaton::{Automaton, StateId, SymbolMap};

/// Read-only view naming the "ports" through which an automaton will be
/// spliced: entry = initial state, exit = accepting states. Everything else
/// delegates to the underlying automaton unchanged.
pub struct Bipole<'a> {
    automaton: &'a Automaton,
    pub entry_states: BTreeSet<StateId>,
    pub exit_states: BTreeSet<StateId>,
}

impl<'a> Bipole<'a> {
    pub fn new(automaton: &'a Automaton) -> Bipole<'a> {
        Bipole {
            automaton,
            entry_states: automaton.initial_state.iter().cloned().collect(),
            exit_states: automaton.accepting_states.clone(),
        }
    }

    pub fn automaton(&self) -> &Automaton {
        self.automaton
    }
}

/// Closes a bipole under repetition by adding feedback edges from every exit
/// state back to every entry state (exit == entry self-loops are skipped).
///
/// The symbol on a synthesized feedback edge is the smallest existing
/// outgoing symbol of the exit state, else the smallest alphabet symbol.
/// This is a structural placeholder, not a language-preserving choice;
/// callers must not rely on which symbol is picked.
pub struct StrongIteration {
    automaton: Automaton,
    pub entry_states: BTreeSet<StateId>,
}

impl StrongIteration {
    pub fn new(bipole: &Bipole) -> StrongIteration {
        let mut automaton = bipole.automaton().clone();
        for exit in &bipole.exit_states {
            let Some(symbol) = feedback_symbol(&automaton, exit) else {
                continue;
            };
            for entry in &bipole.entry_states {
                if exit == entry {
                    continue;
                }
                automaton
                    .transitions
                    .entry(exit.clone())
                    .or_default()
                    .entry(symbol.clone())
                    .or_default()
                    .insert(entry.clone());
            }
        }
        StrongIteration {
            automaton,
            entry_states: bipole.entry_states.clone(),
        }
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }
}

fn feedback_symbol(automaton: &Automaton, exit: &StateId) -> Option<String> {
    automaton
        .transitions_from(exit)
        .map(|(symbol, _)| symbol.clone())
        .next()
        .or_else(|| automaton.alphabet.iter().next().cloned())
}

/// Handoff product: run B, and once in one of B's accepting states, freeze
/// the B component and advance only the (strongly iterated) C component.
/// Acceptance is determined solely by the C side.
pub struct Concatenation<'a, 'b> {
    bipole_b: Bipole<'a>,
    iterated_c: &'b StrongIteration,
}

impl<'a, 'b> Concatenation<'a, 'b> {
    pub fn new(bipole_b: Bipole<'a>, iterated_c: &'b StrongIteration) -> Concatenation<'a, 'b> {
        Concatenation {
            bipole_b,
            iterated_c,
        }
    }

    pub fn to_buchi_automaton(&self) -> Automaton {
        let b = self.bipole_b.automaton();
        let c = self.iterated_c.automaton();

        let alphabet: BTreeSet<String> = b.alphabet.intersection(&c.alphabet).cloned().collect();

        let (Some(initial_b), Some(entry_c)) = (
            &b.initial_state,
            self.iterated_c.entry_states.iter().next(),
        ) else {
            let mut out = Automaton::empty();
            out.alphabet = alphabet;
            return out;
        };

        let states: BTreeSet<StateId> = b
            .states
            .iter()
            .cartesian_product(c.states.iter())
            .map(|(sb, sc)| StateId::pair(sb.clone(), sc.clone()))
            .collect();

        let mut transitions: BTreeMap<StateId, SymbolMap> = BTreeMap::new();
        for (sb, sc) in b.states.iter().cartesian_product(c.states.iter()) {
            for symbol in &alphabet {
                let targets: BTreeSet<StateId> = if b.is_accepting(sb) {
                    // handoff: B component stays fixed, only C advances
                    c.successors(sc, symbol)
                        .map(|tc| StateId::pair(sb.clone(), tc.clone()))
                        .collect()
                } else {
                    b.successors(sb, symbol)
                        .cartesian_product(c.successors(sc, symbol).collect_vec())
                        .map(|(tb, tc)| StateId::pair(tb.clone(), tc.clone()))
                        .collect()
                };
                if !targets.is_empty() {
                    transitions
                        .entry(StateId::pair(sb.clone(), sc.clone()))
                        .or_default()
                        .insert(symbol.clone(), targets);
                }
            }
        }

        let accepting_states: BTreeSet<StateId> = b
            .states
            .iter()
            .cartesian_product(c.accepting_states.iter())
            .map(|(sb, fc)| StateId::pair(sb.clone(), fc.clone()))
            .collect();

        Automaton {
            states,
            alphabet,
            transitions,
            initial_state: Some(StateId::pair(initial_b.clone(), entry_c.clone())),
            accepting_states,
            epsilon: None,
        }
    }
}

impl Automaton {
    /// Concatenation of the languages, as a structural construction: mark
    /// the ports of both operands, strongly iterate the second, then build
    /// the handoff product.
    pub fn concatenate(&self, other: &Automaton) -> Automaton {
        let iterated = StrongIteration::new(&Bipole::new(other));
        Concatenation::new(Bipole::new(self), &iterated).to_buchi_automaton()
    }
}

#[cfg(test)]
fn two_cycle(prefix: &str) -> Automaton {
    // p0 -a-> p1, p1 -b-> p0, accepting {p1}
    let s0 = StateId::atom(format!("{}0", prefix));
    let s1 = StateId::atom(format!("{}1", prefix));
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string(), "b".to_string()].into();
    automaton.add_transition(s0.clone(), "a", s1.clone());
    automaton.add_transition(s1.clone(), "b", s0.clone());
    automaton.initial_state = Some(s0);
    automaton.accepting_states = [s1].into();
    automaton
}

#[test]
fn test_bipole_ports() {
    let automaton = two_cycle("q");
    let bipole = Bipole::new(&automaton);
    assert_eq!(bipole.entry_states, [StateId::atom("q0")].into());
    assert_eq!(bipole.exit_states, [StateId::atom("q1")].into());
    assert_eq!(bipole.automaton(), &automaton);
}

#[test]
fn test_strong_iteration_adds_feedback_edges() {
    let automaton = two_cycle("q");
    let iterated = StrongIteration::new(&Bipole::new(&automaton));
    // exit q1 already has an outgoing `b`, so the feedback edge reuses it
    let successors: BTreeSet<StateId> = iterated
        .automaton()
        .successors(&StateId::atom("q1"), "b")
        .cloned()
        .collect();
    assert!(successors.contains(&StateId::atom("q0")));
}

#[test]
fn test_strong_iteration_without_outgoing_symbol() {
    // exit state with no outgoing edges falls back to an alphabet symbol
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string(), "b".to_string()].into();
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q1"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states = [StateId::atom("q1")].into();
    let iterated = StrongIteration::new(&Bipole::new(&automaton));
    let successors: BTreeSet<StateId> = iterated
        .automaton()
        .successors(&StateId::atom("q1"), "a")
        .cloned()
        .collect();
    assert_eq!(successors, [StateId::atom("q0")].into());
}

#[test]
fn test_strong_iteration_skips_self_loop() {
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string()].into();
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q0"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states = [StateId::atom("q0")].into();
    let iterated = StrongIteration::new(&Bipole::new(&automaton));
    // exit == entry: no synthesized edge beyond the existing one
    assert_eq!(iterated.automaton().transitions, automaton.transitions);
}

#[test]
fn test_concatenation_handoff_invariant() {
    let b = two_cycle("q");
    let c = two_cycle("s");
    let result = b.concatenate(&c);

    assert_eq!(
        result.initial_state,
        Some(StateId::pair(StateId::atom("q0"), StateId::atom("s0")))
    );
    assert_eq!(result.alphabet, b.alphabet);
    // acceptance is determined solely by the C side
    assert_eq!(
        result.accepting_states,
        [
            StateId::pair(StateId::atom("q0"), StateId::atom("s1")),
            StateId::pair(StateId::atom("q1"), StateId::atom("s1")),
        ]
        .into()
    );

    let iterated = StrongIteration::new(&Bipole::new(&c));
    for (composite, by_symbol) in &result.transitions {
        let StateId::Pair(sb, sc) = composite else {
            panic!("composite state expected, got {}", composite);
        };
        for (symbol, targets) in by_symbol {
            if b.is_accepting(sb.as_ref()) {
                // B component is frozen, C advances alone
                let expected: BTreeSet<StateId> = iterated
                    .automaton()
                    .successors(sc.as_ref(), symbol)
                    .map(|tc| StateId::pair((**sb).clone(), tc.clone()))
                    .collect();
                assert_eq!(targets, &expected, "at {} on {}", composite, symbol);
            } else {
                for target in targets {
                    let StateId::Pair(tb, tc) = target else {
                        panic!("composite target expected, got {}", target);
                    };
                    assert!(b.successors(sb.as_ref(), symbol).any(|t| t == tb.as_ref()));
                    assert!(iterated
                        .automaton()
                        .successors(sc.as_ref(), symbol)
                        .any(|t| t == tc.as_ref()));
                }
            }
        }
    }
}

#[test]
fn test_concatenate_with_empty_operand() {
    let b = two_cycle("q");
    let result = b.concatenate(&Automaton::empty());
    assert!(result.states.is_empty());
    assert_eq!(result.initial_state, None);
}
