// src/atn/mod.rs
pub mod bypass;
pub mod deserializer;
pub mod dump;
pub mod error;
pub mod intervals;
pub mod states;
pub mod transitions;
pub mod uuid;
pub mod verify;

// Re-exports to keep the external API flat.
pub use deserializer::{AtnDeserializer, DeserializeOptions, payload_from_le_bytes};
pub use error::AtnError;
pub use intervals::{Interval, IntervalSet};
pub use states::{AtnState, Decision, StateKind, StateTag};
pub use transitions::{Transition, TransitionTag};

/// Token type meaning end of input; serialized as 0xFFFF or via the ATOM/RANGE
/// EOF flag.
pub const TOKEN_EOF: i32 = -1;

/// What the automaton drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum GrammarKind {
    Lexer = 0,
    Parser = 1,
}

/// The deserialized automaton. Owns every state (slot index == state number;
/// `None` slots were serialized with an invalid tag) and the shared
/// interval-set table; every other table holds state numbers.
#[derive(Debug, Clone)]
pub struct Atn {
    pub grammar: GrammarKind,
    /// Inclusive upper bound of token type integers this grammar uses.
    pub max_token_type: i32,
    pub states: Vec<Option<AtnState>>,
    /// Rule number -> rule start state.
    pub rule_to_start_state: Vec<usize>,
    /// Rule number -> rule stop state, filled by scanning the arena.
    pub rule_to_stop_state: Vec<Option<usize>>,
    /// Lexer grammars only: rule number -> emitted token type. Repurposed by
    /// the bypass rewriter to carry synthetic per-rule token types.
    pub rule_to_token_type: Vec<i32>,
    /// Lexer grammars only: rule number -> embedded action index (-1 = none).
    pub rule_to_action_index: Vec<i32>,
    /// Lexer mode number -> tokens-start state.
    pub mode_to_start_state: Vec<usize>,
    /// Decision number -> decision state.
    pub decision_to_state: Vec<usize>,
    /// Interval sets referenced by set/not-set transitions, in payload order.
    pub sets: Vec<IntervalSet>,
}

impl Atn {
    pub fn new(grammar: GrammarKind, max_token_type: i32) -> Self {
        Self {
            grammar,
            max_token_type,
            states: Vec::new(),
            rule_to_start_state: Vec::new(),
            rule_to_stop_state: Vec::new(),
            rule_to_token_type: Vec::new(),
            rule_to_action_index: Vec::new(),
            mode_to_start_state: Vec::new(),
            decision_to_state: Vec::new(),
            sets: Vec::new(),
        }
    }

    /// Append a state (or an empty slot) and stamp it with its number.
    pub fn add_state(&mut self, state: Option<AtnState>) -> usize {
        let number = self.states.len();
        self.states.push(state.map(|mut s| {
            s.number = number;
            s
        }));
        number
    }

    /// Register a state as a prediction decision, assigning the next decision
    /// number. The state must be a decision-capable kind.
    pub fn define_decision_state(&mut self, state_number: usize) -> Result<i32, AtnError> {
        let number = self.decision_to_state.len() as i32;
        let d = self
            .state_mut(state_number)
            .and_then(|s| s.kind.decision_mut())
            .ok_or_else(|| {
                AtnError::InvalidArgument(format!(
                    "state {state_number} cannot carry a decision number"
                ))
            })?;
        d.number = number;
        self.decision_to_state.push(state_number);
        Ok(number)
    }

    pub fn state(&self, number: usize) -> Option<&AtnState> {
        self.states.get(number).and_then(|s| s.as_ref())
    }

    pub fn state_mut(&mut self, number: usize) -> Option<&mut AtnState> {
        self.states.get_mut(number).and_then(|s| s.as_mut())
    }
}
