pub mod automaton;
pub mod compose;
pub mod concat;
pub mod convert;
pub mod exchange;
pub mod regex;

pub use automaton::{Automaton, AutomatonError, StateId};
