//! Wire format for handing automata to and from the I/O layer.
//!
//! The record mirrors the JSON shape the surrounding tooling speaks: ordered
//! lists on the wire, sets in memory. Round-tripping reproduces the same
//! states, alphabet, transition relation, initial state and accepting set
//! regardless of list ordering.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::automaton::{Automaton, AutomatonError, StateId, SymbolMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomatonRecord {
    pub states: Vec<StateId>,
    pub alphabet: Vec<String>,
    /// state -> symbol -> successor list
    pub transitions: BTreeMap<StateId, BTreeMap<String, Vec<StateId>>>,
    #[serde(default, deserialize_with = "scalar_or_singleton")]
    pub initial_state: Option<StateId>,
    #[serde(alias = "final_states")]
    pub accepting_states: Vec<StateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<String>,
}

/// Some producers write `initial_state` as a one-element list. Accept both.
fn scalar_or_singleton<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<StateId>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ScalarOrList {
        Scalar(StateId),
        List(Vec<StateId>),
    }
    match Option::<ScalarOrList>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ScalarOrList::Scalar(state)) => Ok(Some(state)),
        Some(ScalarOrList::List(mut states)) => match states.len() {
            0 => Ok(None),
            1 => Ok(states.pop()),
            n => Err(serde::de::Error::custom(format!(
                "expected a single initial state, got {}",
                n
            ))),
        },
    }
}

impl Automaton {
    pub fn to_record(&self) -> AutomatonRecord {
        AutomatonRecord {
            states: self.states.iter().cloned().collect(),
            alphabet: self.alphabet.iter().cloned().collect(),
            transitions: self
                .transitions
                .iter()
                .map(|(from, by_symbol)| {
                    (
                        from.clone(),
                        by_symbol
                            .iter()
                            .map(|(symbol, targets)| {
                                (symbol.clone(), targets.iter().cloned().collect())
                            })
                            .collect(),
                    )
                })
                .collect(),
            initial_state: self.initial_state.clone(),
            accepting_states: self.accepting_states.iter().cloned().collect(),
            epsilon: self.epsilon.clone(),
        }
    }

    /// Decoding runs full construction-time validation; a record violating
    /// the structural invariants is rejected, never repaired.
    pub fn from_record(record: AutomatonRecord) -> Result<Automaton, AutomatonError> {
        let mut transitions: BTreeMap<StateId, SymbolMap> = BTreeMap::new();
        for (from, by_symbol) in record.transitions {
            let entry = transitions.entry(from).or_default();
            for (symbol, targets) in by_symbol {
                entry
                    .entry(symbol)
                    .or_default()
                    .extend(targets.into_iter());
            }
        }
        Automaton::new(
            record.states.into_iter().collect(),
            record.alphabet.into_iter().collect(),
            transitions,
            record.initial_state,
            record.accepting_states.into_iter().collect(),
            record.epsilon,
        )
    }

    pub fn to_json(&self) -> Result<String, AutomatonError> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    pub fn from_json(json: &str) -> Result<Automaton, AutomatonError> {
        let record: AutomatonRecord = serde_json::from_str(json)?;
        Automaton::from_record(record)
    }
}

#[cfg(test)]
use crate::automaton::ArbAutomaton;
#[cfg(test)]
use quickcheck_macros::quickcheck;

#[cfg(test)]
fn sample() -> Automaton {
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string(), "b".to_string()].into();
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q1"));
    automaton.add_transition(StateId::atom("q0"), "b", StateId::atom("q0"));
    automaton.add_transition(StateId::atom("q1"), "b", StateId::atom("q0"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states = [StateId::atom("q1")].into();
    automaton
}

#[test]
fn test_json_roundtrip() {
    let automaton = sample();
    let decoded = Automaton::from_json(&automaton.to_json().unwrap()).unwrap();
    assert_eq!(decoded, automaton);
}

#[test]
fn test_decode_is_order_insensitive() {
    let json = r#"{
        "states": ["q1", "q0"],
        "alphabet": ["b", "a"],
        "transitions": {"q0": {"a": ["q1"], "b": ["q0"]}, "q1": {"b": ["q0"]}},
        "initial_state": "q0",
        "accepting_states": ["q1"]
    }"#;
    assert_eq!(Automaton::from_json(json).unwrap(), sample());
}

#[test]
fn test_decode_accepts_final_states_alias_and_list_initial() {
    let json = r#"{
        "states": ["q0", "q1"],
        "alphabet": ["a", "b"],
        "transitions": {"q0": {"a": ["q1"], "b": ["q0"]}, "q1": {"b": ["q0"]}},
        "initial_state": ["q0"],
        "final_states": ["q1"]
    }"#;
    assert_eq!(Automaton::from_json(json).unwrap(), sample());
}

#[test]
fn test_decode_rejects_invalid_record() {
    let json = r#"{
        "states": ["q0"],
        "alphabet": ["a"],
        "transitions": {},
        "initial_state": "missing",
        "accepting_states": []
    }"#;
    let err = Automaton::from_json(json).unwrap_err();
    assert!(matches!(err, AutomatonError::InitialStateNotInStates(_)));
}

#[test]
fn test_composite_states_survive_the_wire() {
    let product = sample().compose(&sample());
    let decoded = Automaton::from_json(&product.to_json().unwrap()).unwrap();
    assert_eq!(decoded, product);
    assert!(decoded
        .states
        .contains(&StateId::pair(StateId::atom("q0"), StateId::atom("q1"))));
}

#[test]
fn test_epsilon_field_roundtrip() {
    let mut enfa = sample();
    enfa.epsilon = Some("eps".to_string());
    enfa.add_transition(StateId::atom("q1"), "eps", StateId::atom("q0"));
    let decoded = Automaton::from_json(&enfa.to_json().unwrap()).unwrap();
    assert_eq!(decoded.epsilon, Some("eps".to_string()));
    assert_eq!(decoded, enfa);
}

#[cfg(test)]
#[quickcheck]
fn prop_record_roundtrip(arb: ArbAutomaton) -> bool {
    let automaton = arb.0;
    match automaton.to_json().and_then(|j| Automaton::from_json(&j)) {
        Ok(decoded) => decoded == automaton,
        Err(_) => false,
    }
}
