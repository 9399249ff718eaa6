//! Best-effort regular-expression summaries of an automaton's structure.
//!
//! Two distinct operations with different output semantics, kept separate on
//! purpose: `approximate_regex_scc` summarizes accepting cycles, while
//! `approximate_regex_bounded` summarizes shortest accepting paths. Neither
//! certifies ω-regular language equivalence, and accepting states that are
//! not reachable contribute nothing.

use std::collections::{BTreeSet, VecDeque};

use itertools::Itertools;

use crate::automaton::{Automaton, StateId};

#[derive(Debug)]
enum Regex {
    Star(Box<Regex>),
    Or(Box<Regex>, Box<Regex>),
    Concat(Box<Regex>, Box<Regex>),
    Sym(String),
    Eps,
}

impl Regex {
    fn concat(a: Regex, b: Regex) -> Regex {
        Regex::Concat(Box::new(a), Box::new(b))
    }

    fn or(a: Regex, b: Regex) -> Regex {
        Regex::Or(Box::new(a), Box::new(b))
    }

    fn render(&self) -> String {
        match self {
            Regex::Star(inner) => format!("({})*", inner.render()),
            Regex::Or(a, b) => format!("{}|{}", a.render(), b.render()),
            Regex::Concat(a, b) => format!("{}{}", a.render(), b.render()),
            Regex::Sym(s) => s.clone(),
            Regex::Eps => String::new(),
        }
    }
}

#[test]
fn test_regex_render() {
    let r = Regex::or(
        Regex::Star(Box::new(Regex::concat(
            Regex::Sym("a".to_string()),
            Regex::Sym("b".to_string()),
        ))),
        Regex::Sym("c".to_string()),
    );
    assert_eq!(r.render(), "(ab)*|c");
}

/// Tarjan's algorithm with an explicit DFS stack, so recursion depth does
/// not depend on the number of states. Components partition the full state
/// set; the transition symbols are ignored, only the edge structure counts.
pub fn strongly_connected_components(automaton: &Automaton) -> Vec<BTreeSet<StateId>> {
    let nodes: Vec<&StateId> = automaton.states.iter().collect();
    let n = nodes.len();
    let index_of = |state: &StateId| nodes.binary_search(&state).ok();

    let mut adjacency: Vec<Vec<usize>> = vec![vec![]; n];
    for (i, state) in nodes.iter().copied().enumerate() {
        adjacency[i] = automaton
            .transitions_from(state)
            .flat_map(|(_, targets)| targets.iter())
            .filter_map(index_of)
            .sorted()
            .dedup()
            .collect();
    }

    let mut index_counter = 0usize;
    let mut indices = vec![usize::MAX; n];
    let mut lowlinks = vec![usize::MAX; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut components: Vec<BTreeSet<StateId>> = Vec::new();

    for root in 0..n {
        if indices[root] != usize::MAX {
            continue;
        }
        let mut dfs_stack: Vec<(usize, usize)> = vec![(root, 0)];
        indices[root] = index_counter;
        lowlinks[root] = index_counter;
        index_counter += 1;
        stack.push(root);
        on_stack[root] = true;

        while let Some((v, ni)) = dfs_stack.last_mut() {
            let v = *v;
            if *ni < adjacency[v].len() {
                let w = adjacency[v][*ni];
                *ni += 1;
                if indices[w] == usize::MAX {
                    indices[w] = index_counter;
                    lowlinks[w] = index_counter;
                    index_counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    dfs_stack.push((w, 0));
                } else if on_stack[w] {
                    lowlinks[v] = lowlinks[v].min(indices[w]);
                }
            } else {
                if lowlinks[v] == indices[v] {
                    let mut component = BTreeSet::new();
                    loop {
                        let w = stack.pop().expect("tarjan stack underflow");
                        on_stack[w] = false;
                        component.insert(nodes[w].clone());
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
                let lowlink_v = lowlinks[v];
                dfs_stack.pop();
                if let Some((parent, _)) = dfs_stack.last() {
                    lowlinks[*parent] = lowlinks[*parent].min(lowlink_v);
                }
            }
        }
    }
    components
}

/// Simple cycles inside one component, as sequences of edge symbols.
/// Explicit path-stack DFS; each cycle is enumerated once, anchored at its
/// smallest member state.
fn component_cycles(automaton: &Automaton, component: &BTreeSet<StateId>) -> Vec<Vec<String>> {
    let members: Vec<&StateId> = component.iter().collect();
    let local = |state: &StateId| members.binary_search(&state).ok();

    let mut adjacency: Vec<Vec<(String, usize)>> = vec![vec![]; members.len()];
    for (i, state) in members.iter().copied().enumerate() {
        for (symbol, targets) in automaton.transitions_from(state) {
            for target in targets {
                if let Some(j) = local(target) {
                    adjacency[i].push((symbol.clone(), j));
                }
            }
        }
        adjacency[i].sort();
    }

    let mut cycles: Vec<Vec<String>> = Vec::new();
    for anchor in 0..members.len() {
        let mut dfs_stack: Vec<(usize, usize)> = vec![(anchor, 0)];
        let mut path_symbols: Vec<String> = Vec::new();
        let mut on_path: BTreeSet<usize> = [anchor].into();

        while let Some((node, ni)) = dfs_stack.last_mut() {
            let node = *node;
            if *ni < adjacency[node].len() {
                let (symbol, target) = adjacency[node][*ni].clone();
                *ni += 1;
                if target == anchor {
                    let mut cycle = path_symbols.clone();
                    cycle.push(symbol);
                    cycles.push(cycle);
                } else if target > anchor && !on_path.contains(&target) {
                    on_path.insert(target);
                    path_symbols.push(symbol);
                    dfs_stack.push((target, 0));
                }
            } else {
                dfs_stack.pop();
                if node != anchor {
                    on_path.remove(&node);
                    path_symbols.pop();
                }
            }
        }
    }
    cycles
}

impl Automaton {
    /// SCC-based structural summary: every simple cycle through a component
    /// that contains an accepting state becomes a starred alternative.
    pub fn approximate_regex_scc(&self) -> String {
        let components = strongly_connected_components(self);
        log::debug!("approximate regex: {} components", components.len());

        let mut alternatives: BTreeSet<String> = BTreeSet::new();
        for component in &components {
            if !component.iter().any(|s| self.is_accepting(s)) {
                continue;
            }
            for cycle in component_cycles(self, component) {
                let body = cycle
                    .into_iter()
                    .map(Regex::Sym)
                    .reduce(Regex::concat)
                    .unwrap_or(Regex::Eps);
                alternatives.insert(Regex::Star(Box::new(body)).render());
            }
        }
        alternatives
            .into_iter()
            .map(Regex::Sym)
            .reduce(Regex::or)
            .map(|r| r.render())
            .unwrap_or_default()
    }

    /// Bounded-path structural summary: for each accepting state, the first
    /// path found by a breadth-first search from the initial state, capped
    /// at `cap` edges, rendered as a plain symbol literal.
    pub fn approximate_regex_bounded(&self, cap: usize) -> String {
        let literals = self
            .accepting_states
            .iter()
            .filter_map(|target| bounded_first_path(self, target, cap))
            .map(|path| path.concat())
            .join("|");
        scrub_artifacts(&literals)
    }
}

/// First path (as edge symbols) from the initial state to `target` with at
/// most `cap` edges, breadth first. Visits at most one frontier entry per
/// state, so the search touches O(states x cap) entries before giving up.
fn bounded_first_path(
    automaton: &Automaton,
    target: &StateId,
    cap: usize,
) -> Option<Vec<String>> {
    let start = automaton.initial_state.as_ref()?;
    if start == target {
        return Some(vec![]);
    }
    let mut visited: BTreeSet<StateId> = [start.clone()].into();
    let mut queue: VecDeque<(StateId, Vec<String>)> = [(start.clone(), vec![])].into();
    while let Some((state, path)) = queue.pop_front() {
        if path.len() >= cap {
            continue;
        }
        for (symbol, targets) in automaton.transitions_from(&state) {
            for next in targets {
                if visited.contains(next) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(symbol.clone());
                if next == target {
                    return Some(extended);
                }
                visited.insert(next.clone());
                queue.push_back((next.clone(), extended));
            }
        }
    }
    None
}

/// Naive string concatenation leaves `||` and `()` artifacts behind; strip
/// them.
fn scrub_artifacts(s: &str) -> String {
    let mut out = s.replace("()", "");
    while out.contains("||") {
        out = out.replace("||", "|");
    }
    out.trim_matches('|').to_string()
}

#[cfg(test)]
use crate::automaton::ArbAutomaton;
#[cfg(test)]
use quickcheck_macros::quickcheck;

#[cfg(test)]
fn reachable_from(automaton: &Automaton, from: &StateId) -> BTreeSet<StateId> {
    let mut reachable: BTreeSet<StateId> = [from.clone()].into();
    let mut queue: VecDeque<StateId> = [from.clone()].into();
    while let Some(state) = queue.pop_front() {
        for (_, targets) in automaton.transitions_from(&state) {
            for next in targets {
                if reachable.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
    }
    reachable
}

#[cfg(test)]
#[quickcheck]
fn prop_sccs_partition_the_state_set(arb: ArbAutomaton) -> bool {
    let automaton = arb.0;
    let components = strongly_connected_components(&automaton);
    let mut seen: BTreeSet<StateId> = BTreeSet::new();
    for component in &components {
        if component.is_empty() {
            return false;
        }
        for state in component {
            if !seen.insert(state.clone()) {
                return false; // duplicated across components
            }
        }
    }
    seen == automaton.states
}

#[cfg(test)]
#[quickcheck]
fn prop_scc_members_are_mutually_reachable(arb: ArbAutomaton) -> bool {
    let automaton = arb.0;
    let components = strongly_connected_components(&automaton);
    for component in &components {
        for u in component {
            let from_u = reachable_from(&automaton, u);
            for v in component {
                if !from_u.contains(v) {
                    return false;
                }
            }
            // states outside the component must not be mutually reachable
            for v in automaton.states.difference(component) {
                if from_u.contains(v) && reachable_from(&automaton, v).contains(u) {
                    return false;
                }
            }
        }
    }
    true
}

#[test]
fn test_scc_regex_two_cycle() {
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string(), "b".to_string()].into();
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q1"));
    automaton.add_transition(StateId::atom("q1"), "b", StateId::atom("q0"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states = [StateId::atom("q1")].into();
    assert_eq!(automaton.approximate_regex_scc(), "(ab)*");
}

#[test]
fn test_scc_regex_self_loop_only() {
    // the only accepting component is q3 with its `a` self-loop
    let automaton = diamond();
    assert_eq!(automaton.approximate_regex_scc(), "(a)*");
}

#[test]
fn test_scc_regex_skips_non_accepting_components() {
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string(), "b".to_string()].into();
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q0"));
    automaton.add_transition(StateId::atom("q0"), "b", StateId::atom("q1"));
    automaton.add_transition(StateId::atom("q1"), "b", StateId::atom("q1"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states = [StateId::atom("q1")].into();
    // the q0 self-loop is not in an accepting component
    assert_eq!(automaton.approximate_regex_scc(), "(b)*");
}

#[cfg(test)]
fn diamond() -> Automaton {
    // q0 -a-> q1 -c-> q3, q0 -b-> q2 -c-> q3, q3 -a-> q3, accepting {q3}
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string(), "b".to_string(), "c".to_string()].into();
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q1"));
    automaton.add_transition(StateId::atom("q0"), "b", StateId::atom("q2"));
    automaton.add_transition(StateId::atom("q1"), "c", StateId::atom("q3"));
    automaton.add_transition(StateId::atom("q2"), "c", StateId::atom("q3"));
    automaton.add_transition(StateId::atom("q3"), "a", StateId::atom("q3"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states = [StateId::atom("q3")].into();
    automaton
}

#[test]
fn test_bounded_regex_two_cycle() {
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string(), "b".to_string()].into();
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q1"));
    automaton.add_transition(StateId::atom("q1"), "b", StateId::atom("q0"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states = [StateId::atom("q1")].into();
    let regex = automaton.approximate_regex_bounded(10);
    assert_eq!(regex, "a");
    assert!(!regex.contains('b'));
}

#[test]
fn test_bounded_regex_diamond() {
    let regex = diamond().approximate_regex_bounded(10);
    assert!(regex.contains("ac") || regex.contains("bc"));
    assert!(!regex.contains("aa"));
}

#[test]
fn test_bounded_regex_respects_cap() {
    // accepting state is three edges away; cap of 2 finds nothing
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string()].into();
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q1"));
    automaton.add_transition(StateId::atom("q1"), "a", StateId::atom("q2"));
    automaton.add_transition(StateId::atom("q2"), "a", StateId::atom("q3"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states = [StateId::atom("q3")].into();
    assert_eq!(automaton.approximate_regex_bounded(2), "");
    assert_eq!(automaton.approximate_regex_bounded(3), "aaa");
}

#[test]
fn test_bounded_regex_accepting_initial_state() {
    // empty literal for the initial state scrubs away cleanly
    let mut automaton = Automaton::empty();
    automaton.alphabet = ["a".to_string()].into();
    automaton.add_transition(StateId::atom("q0"), "a", StateId::atom("q1"));
    automaton.initial_state = Some(StateId::atom("q0"));
    automaton.accepting_states = [StateId::atom("q0"), StateId::atom("q1")].into();
    assert_eq!(automaton.approximate_regex_bounded(5), "a");
}

#[test]
fn test_regex_of_empty_automaton() {
    assert_eq!(Automaton::empty().approximate_regex_scc(), "");
    assert_eq!(Automaton::empty().approximate_regex_bounded(5), "");
}

#[test]
fn test_scrub_artifacts() {
    assert_eq!(scrub_artifacts("a||b"), "a|b");
    assert_eq!(scrub_artifacts("|a|"), "a");
    assert_eq!(scrub_artifacts("()a()"), "a");
    assert_eq!(scrub_artifacts(""), "");
}
