use std::{
    collections::{BTreeMap, BTreeSet},
    convert::Infallible,
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// State identifier. Product operations synthesize `Pair` identifiers, so
/// nested composition (a product of a product) stays well-typed instead of
/// collapsing into formatted strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StateId {
    Atom(String),
    Pair(Box<StateId>, Box<StateId>),
}

impl StateId {
    pub fn atom(name: impl Into<String>) -> StateId {
        StateId::Atom(name.into())
    }

    pub fn pair(left: StateId, right: StateId) -> StateId {
        StateId::Pair(Box::new(left), Box::new(right))
    }

    /// Inverse of `Display`: `(l,r)` with a balanced top-level comma parses
    /// as a pair, anything else is an atom. Total, never fails.
    pub fn parse(s: &str) -> StateId {
        fn split_pair(s: &str) -> Option<(&str, &str)> {
            let inner = s.strip_prefix('(')?.strip_suffix(')')?;
            let mut depth: usize = 0;
            for (i, c) in inner.char_indices() {
                match c {
                    '(' => depth += 1,
                    ')' => depth = depth.checked_sub(1)?,
                    ',' if depth == 0 => return Some((&inner[..i], &inner[i + 1..])),
                    _ => {}
                }
            }
            None
        }
        match split_pair(s) {
            Some((l, r)) => StateId::pair(StateId::parse(l), StateId::parse(r)),
            None => StateId::Atom(s.to_string()),
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateId::Atom(name) => write!(f, "{}", name),
            StateId::Pair(l, r) => write!(f, "({},{})", l, r),
        }
    }
}

impl FromStr for StateId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<StateId, Infallible> {
        Ok(StateId::parse(s))
    }
}

impl Serialize for StateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<StateId, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(StateId::parse(&s))
    }
}

#[test]
fn test_state_id_roundtrip() {
    let nested = StateId::pair(
        StateId::pair(StateId::atom("q0"), StateId::atom("s1")),
        StateId::atom("t2"),
    );
    assert_eq!(nested.to_string(), "((q0,s1),t2)");
    assert_eq!(StateId::parse(&nested.to_string()), nested);
    assert_eq!(StateId::parse("q0"), StateId::atom("q0"));
    // unbalanced input stays an atom
    assert_eq!(StateId::parse("(q0"), StateId::atom("(q0"));
}

#[derive(Debug, thiserror::Error)]
pub enum AutomatonError {
    #[error("initial state {0} is not in the state set")]
    InitialStateNotInStates(StateId),

    #[error("a non-empty automaton needs an initial state")]
    MissingInitialState,

    #[error("accepting state {0} is not in the state set")]
    AcceptingStateNotInStates(StateId),

    #[error("transition endpoint {0} is not in the state set")]
    TransitionEndpointNotInStates(StateId),

    #[error("transition symbol {0} is neither in the alphabet nor the epsilon marker")]
    SymbolNotInAlphabet(String),

    #[error("malformed automaton record: {0}")]
    MalformedRecord(String),

    #[error("invalid automaton JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-state transition relation: symbol -> set of successor states.
pub type SymbolMap = BTreeMap<String, BTreeSet<StateId>>;

/// Nondeterministic automaton with optional epsilon moves, also used as a
/// Büchi automaton (acceptance is then read under the Büchi condition; this
/// crate only preserves the accepting marking through transformations, it
/// never evaluates infinite runs).
///
/// Constructed once, treated as immutable afterwards: every operation
/// returns a fresh `Automaton`. Ordered collections keep all don't-care
/// choices in the algorithms deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    pub states: BTreeSet<StateId>,
    pub alphabet: BTreeSet<String>,
    pub transitions: BTreeMap<StateId, SymbolMap>,
    pub initial_state: Option<StateId>,
    pub accepting_states: BTreeSet<StateId>,
    /// Designated "no input consumed" symbol, present only for ENFA-shaped
    /// automata. Never a member of `alphabet`.
    pub epsilon: Option<String>,
}

impl Automaton {
    /// Validating constructor. Structural-invariant violations are fatal
    /// here and never silently repaired; the transformation operations all
    /// trust their input and do not re-validate.
    pub fn new(
        states: BTreeSet<StateId>,
        alphabet: BTreeSet<String>,
        transitions: BTreeMap<StateId, SymbolMap>,
        initial_state: Option<StateId>,
        accepting_states: BTreeSet<StateId>,
        epsilon: Option<String>,
    ) -> Result<Automaton, AutomatonError> {
        match &initial_state {
            Some(initial) if !states.contains(initial) => {
                return Err(AutomatonError::InitialStateNotInStates(initial.clone()));
            }
            None if !states.is_empty() => return Err(AutomatonError::MissingInitialState),
            _ => {}
        }
        if let Some(bad) = accepting_states.iter().find(|s| !states.contains(*s)) {
            return Err(AutomatonError::AcceptingStateNotInStates(bad.clone()));
        }
        for (from, by_symbol) in &transitions {
            if !states.contains(from) {
                return Err(AutomatonError::TransitionEndpointNotInStates(from.clone()));
            }
            for (symbol, targets) in by_symbol {
                if !alphabet.contains(symbol) && epsilon.as_deref() != Some(symbol.as_str()) {
                    return Err(AutomatonError::SymbolNotInAlphabet(symbol.clone()));
                }
                if let Some(bad) = targets.iter().find(|t| !states.contains(*t)) {
                    return Err(AutomatonError::TransitionEndpointNotInStates(bad.clone()));
                }
            }
        }
        Ok(Automaton {
            states,
            alphabet,
            transitions,
            initial_state,
            accepting_states,
            epsilon,
        })
    }

    /// Degenerate automaton with no states. Valid input to every operation.
    pub fn empty() -> Automaton {
        Automaton {
            states: BTreeSet::new(),
            alphabet: BTreeSet::new(),
            transitions: BTreeMap::new(),
            initial_state: None,
            accepting_states: BTreeSet::new(),
            epsilon: None,
        }
    }

    pub fn add_transition(&mut self, from: StateId, symbol: impl Into<String>, to: StateId) {
        self.states.insert(from.clone());
        self.states.insert(to.clone());
        self.transitions
            .entry(from)
            .or_default()
            .entry(symbol.into())
            .or_default()
            .insert(to);
    }

    /// Successors of `state` under `symbol`; empty if the relation has no
    /// entry for the pair.
    pub fn successors<'a>(
        &'a self,
        state: &StateId,
        symbol: &str,
    ) -> impl Iterator<Item = &'a StateId> {
        self.transitions
            .get(state)
            .and_then(|by_symbol| by_symbol.get(symbol))
            .into_iter()
            .flatten()
    }

    pub fn transitions_from<'a>(
        &'a self,
        state: &StateId,
    ) -> impl Iterator<Item = (&'a String, &'a BTreeSet<StateId>)> {
        self.transitions.get(state).into_iter().flatten()
    }

    pub fn is_accepting(&self, state: &StateId) -> bool {
        self.accepting_states.contains(state)
    }

    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        dot.push_str("digraph {\n");
        for (from, by_symbol) in &self.transitions {
            for (symbol, targets) in by_symbol {
                for to in targets {
                    dot.push_str(&format!(
                        "{} -> {} [label=\"{}\"]\n",
                        escape_state_for_dot(from),
                        escape_state_for_dot(to),
                        symbol
                    ));
                }
            }
        }
        for state in &self.accepting_states {
            dot.push_str(&format!(
                "{} [shape=doublecircle]\n",
                escape_state_for_dot(state)
            ));
        }
        if let Some(initial) = &self.initial_state {
            dot.push_str("__start [shape=point]\n");
            dot.push_str(&format!("__start -> {}\n", escape_state_for_dot(initial)));
        }
        dot.push_str("}\n");
        dot
    }
}

fn escape_state_for_dot(s: &StateId) -> String {
    format!("\"{}\"", s)
}

#[test]
fn test_validation() {
    let states: BTreeSet<StateId> = [StateId::atom("q0"), StateId::atom("q1")].into();
    let alphabet: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
    let mut transitions: BTreeMap<StateId, SymbolMap> = BTreeMap::new();
    transitions
        .entry(StateId::atom("q0"))
        .or_default()
        .insert("a".to_string(), [StateId::atom("q1")].into());

    assert!(Automaton::new(
        states.clone(),
        alphabet.clone(),
        transitions.clone(),
        Some(StateId::atom("q0")),
        [StateId::atom("q1")].into(),
        None,
    )
    .is_ok());

    let err = Automaton::new(
        states.clone(),
        alphabet.clone(),
        transitions.clone(),
        Some(StateId::atom("q2")),
        BTreeSet::new(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AutomatonError::InitialStateNotInStates(_)));

    let err = Automaton::new(
        states.clone(),
        alphabet.clone(),
        transitions.clone(),
        Some(StateId::atom("q0")),
        [StateId::atom("q2")].into(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AutomatonError::AcceptingStateNotInStates(_)));

    let mut bad_symbol = transitions.clone();
    bad_symbol
        .entry(StateId::atom("q1"))
        .or_default()
        .insert("c".to_string(), [StateId::atom("q0")].into());
    let err = Automaton::new(
        states,
        alphabet,
        bad_symbol,
        Some(StateId::atom("q0")),
        BTreeSet::new(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AutomatonError::SymbolNotInAlphabet(_)));
}

#[test]
fn test_epsilon_symbol_is_allowed_in_transitions() {
    let mut enfa = Automaton::empty();
    enfa.alphabet.insert("x".to_string());
    enfa.epsilon = Some("eps".to_string());
    enfa.add_transition(StateId::atom("0"), "eps", StateId::atom("1"));
    enfa.initial_state = Some(StateId::atom("0"));
    let checked = Automaton::new(
        enfa.states.clone(),
        enfa.alphabet.clone(),
        enfa.transitions.clone(),
        enfa.initial_state.clone(),
        enfa.accepting_states.clone(),
        enfa.epsilon.clone(),
    );
    assert!(checked.is_ok());
}

#[test]
fn test_empty_automaton_is_valid() {
    let automaton = Automaton::new(
        BTreeSet::new(),
        BTreeSet::new(),
        BTreeMap::new(),
        None,
        BTreeSet::new(),
        None,
    )
    .unwrap();
    assert_eq!(automaton, Automaton::empty());
}

#[test]
fn test_to_dot() {
    let mut automaton = Automaton::empty();
    automaton.alphabet.insert("a".to_string());
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q1"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states.insert(StateId::atom("q1"));
    let dot = automaton.to_dot();
    assert!(dot.contains("\"q0\" -> \"q1\" [label=\"a\"]"));
    assert!(dot.contains("\"q1\" [shape=doublecircle]"));
    assert!(dot.contains("__start -> \"q0\""));
}

/// Small random automaton for the quickcheck properties. Always valid by
/// construction.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ArbAutomaton(pub Automaton);

#[cfg(test)]
impl quickcheck::Arbitrary for ArbAutomaton {
    fn arbitrary(g: &mut quickcheck::Gen) -> ArbAutomaton {
        use quickcheck::Arbitrary;

        let n = usize::arbitrary(g) % 6;
        let states: BTreeSet<StateId> = (0..n).map(|i| StateId::atom(format!("q{}", i))).collect();
        let alphabet: BTreeSet<String> = ["a".to_string(), "b".to_string()].into();
        let mut automaton = Automaton::empty();
        automaton.states = states.clone();
        automaton.alphabet = alphabet;
        if n > 0 {
            let edges = usize::arbitrary(g) % (3 * n);
            for _ in 0..edges {
                let from = StateId::atom(format!("q{}", usize::arbitrary(g) % n));
                let symbol = if bool::arbitrary(g) { "a" } else { "b" };
                let to = StateId::atom(format!("q{}", usize::arbitrary(g) % n));
                automaton.add_transition(from, symbol, to);
            }
            automaton.initial_state = Some(StateId::atom("q0"));
            automaton.accepting_states = states
                .iter()
                .filter(|_| bool::arbitrary(g))
                .cloned()
                .collect();
        }
        ArbAutomaton(automaton)
    }
}
