// src/atn/states.rs
// Arena nodes for the automaton graph. A state's number is its slot in
// `Atn::states`; every back-pointer (paired block end, loop-back, rule stop)
// is a state number resolved after the first decode pass.

use super::error::AtnError;
use super::transitions::Transition;

/// Wire tags for serialized states. `Invalid` reserves a numbered slot
/// without materializing a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StateTag {
    Invalid = 0,
    Basic = 1,
    RuleStart = 2,
    BlockStart = 3,
    PlusBlockStart = 4,
    StarBlockStart = 5,
    TokenStart = 6,
    RuleStop = 7,
    BlockEnd = 8,
    StarLoopBack = 9,
    StarLoopEntry = 10,
    PlusLoopBack = 11,
    LoopEnd = 12,
}

/// Prediction bookkeeping for states where the simulator chooses between
/// alternatives. `number` is the slot in `Atn::decision_to_state`, or -1
/// while unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub number: i32,
    pub non_greedy: bool,
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            number: -1,
            non_greedy: false,
        }
    }
}

/// The closed set of state variants. Back-pointers start out `None` and are
/// patched once the whole arena exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateKind {
    Basic,
    RuleStart {
        stop_state: Option<usize>,
        is_precedence_rule: bool,
    },
    RuleStop,
    BasicBlockStart {
        end_state: Option<usize>,
        decision: Decision,
    },
    PlusBlockStart {
        end_state: Option<usize>,
        loop_back_state: Option<usize>,
        decision: Decision,
    },
    StarBlockStart {
        end_state: Option<usize>,
        decision: Decision,
    },
    TokensStart {
        decision: Decision,
    },
    BlockEnd {
        start_state: Option<usize>,
    },
    StarLoopback,
    StarLoopEntry {
        loop_back_state: Option<usize>,
        decision: Decision,
    },
    PlusLoopback {
        decision: Decision,
    },
    LoopEnd {
        loop_back_state: Option<usize>,
    },
}

impl StateKind {
    /// State factory half of the decode: tag to freshly initialized variant.
    /// `Ok(None)` reserves an empty slot; unknown tags are rejected.
    pub fn from_tag(tag: u16) -> Result<Option<StateKind>, AtnError> {
        let kind = match tag {
            t if t == StateTag::Invalid as u16 => return Ok(None),
            t if t == StateTag::Basic as u16 => StateKind::Basic,
            t if t == StateTag::RuleStart as u16 => StateKind::RuleStart {
                stop_state: None,
                is_precedence_rule: false,
            },
            t if t == StateTag::BlockStart as u16 => StateKind::BasicBlockStart {
                end_state: None,
                decision: Decision::default(),
            },
            t if t == StateTag::PlusBlockStart as u16 => StateKind::PlusBlockStart {
                end_state: None,
                loop_back_state: None,
                decision: Decision::default(),
            },
            t if t == StateTag::StarBlockStart as u16 => StateKind::StarBlockStart {
                end_state: None,
                decision: Decision::default(),
            },
            t if t == StateTag::TokenStart as u16 => StateKind::TokensStart {
                decision: Decision::default(),
            },
            t if t == StateTag::RuleStop as u16 => StateKind::RuleStop,
            t if t == StateTag::BlockEnd as u16 => StateKind::BlockEnd { start_state: None },
            t if t == StateTag::StarLoopBack as u16 => StateKind::StarLoopback,
            t if t == StateTag::StarLoopEntry as u16 => StateKind::StarLoopEntry {
                loop_back_state: None,
                decision: Decision::default(),
            },
            t if t == StateTag::PlusLoopBack as u16 => StateKind::PlusLoopback {
                decision: Decision::default(),
            },
            t if t == StateTag::LoopEnd as u16 => StateKind::LoopEnd {
                loop_back_state: None,
            },
            _ => {
                return Err(AtnError::InvalidArgument(format!(
                    "The specified state type {tag} is not valid."
                )));
            }
        };
        Ok(Some(kind))
    }

    /// Block starts of all three flavors share the end-state pairing.
    pub fn is_block_start(&self) -> bool {
        matches!(
            self,
            StateKind::BasicBlockStart { .. }
                | StateKind::PlusBlockStart { .. }
                | StateKind::StarBlockStart { .. }
        )
    }

    pub fn end_state(&self) -> Option<usize> {
        match *self {
            StateKind::BasicBlockStart { end_state, .. }
            | StateKind::PlusBlockStart { end_state, .. }
            | StateKind::StarBlockStart { end_state, .. } => end_state,
            _ => None,
        }
    }

    pub fn set_end_state(&mut self, end: usize) {
        match self {
            StateKind::BasicBlockStart { end_state, .. }
            | StateKind::PlusBlockStart { end_state, .. }
            | StateKind::StarBlockStart { end_state, .. } => *end_state = Some(end),
            _ => {}
        }
    }

    pub fn decision(&self) -> Option<Decision> {
        match *self {
            StateKind::BasicBlockStart { decision, .. }
            | StateKind::PlusBlockStart { decision, .. }
            | StateKind::StarBlockStart { decision, .. }
            | StateKind::TokensStart { decision }
            | StateKind::StarLoopEntry { decision, .. }
            | StateKind::PlusLoopback { decision } => Some(decision),
            _ => None,
        }
    }

    pub fn decision_mut(&mut self) -> Option<&mut Decision> {
        match self {
            StateKind::BasicBlockStart { decision, .. }
            | StateKind::PlusBlockStart { decision, .. }
            | StateKind::StarBlockStart { decision, .. }
            | StateKind::TokensStart { decision }
            | StateKind::StarLoopEntry { decision, .. }
            | StateKind::PlusLoopback { decision } => Some(decision),
            _ => None,
        }
    }

    /// Short name for diagnostics and the dump tool.
    pub fn name(&self) -> &'static str {
        match self {
            StateKind::Basic => "basic",
            StateKind::RuleStart { .. } => "rule_start",
            StateKind::RuleStop => "rule_stop",
            StateKind::BasicBlockStart { .. } => "block_start",
            StateKind::PlusBlockStart { .. } => "plus_block_start",
            StateKind::StarBlockStart { .. } => "star_block_start",
            StateKind::TokensStart { .. } => "tokens_start",
            StateKind::BlockEnd { .. } => "block_end",
            StateKind::StarLoopback => "star_loop_back",
            StateKind::StarLoopEntry { .. } => "star_loop_entry",
            StateKind::PlusLoopback { .. } => "plus_loop_back",
            StateKind::LoopEnd { .. } => "loop_end",
        }
    }
}

/// One materialized state. `number` always equals the state's index in the
/// arena; `rule_index` is -1 for states outside any rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtnState {
    pub number: usize,
    pub rule_index: i32,
    pub epsilon_only_transitions: bool,
    pub transitions: Vec<Transition>,
    pub kind: StateKind,
}

impl AtnState {
    pub fn new(kind: StateKind, rule_index: i32) -> Self {
        Self {
            number: 0,
            rule_index,
            epsilon_only_transitions: false,
            transitions: Vec::new(),
            kind,
        }
    }

    /// Append an edge, tracking whether every edge so far is an epsilon. The
    /// first edge decides; a later mismatch clears the flag for good.
    pub fn add_transition(&mut self, t: Transition) {
        if self.transitions.is_empty() {
            self.epsilon_only_transitions = t.is_epsilon();
        } else if self.epsilon_only_transitions != t.is_epsilon() {
            self.epsilon_only_transitions = false;
        }
        self.transitions.push(t);
    }
}
