// src/atn/dump.rs
// Read-only JSON mirror of a decoded ATN for debugging generated parsers.
// Flat on purpose: state numbers everywhere, edge summaries as strings.

use hashbrown::HashMap;
use serde::Serialize;

use super::states::StateKind;
use super::{Atn, GrammarKind};

#[derive(Serialize)]
pub struct AtnDump {
    grammar: &'static str,
    max_token_type: i32,
    states: Vec<Option<StateDump>>,
    rule_to_start_state: Vec<usize>,
    rule_to_stop_state: Vec<Option<usize>>,
    rule_to_token_type: Vec<i32>,
    rule_to_action_index: Vec<i32>,
    mode_to_start_state: Vec<usize>,
    decision_to_state: Vec<usize>,
    sets: Vec<Vec<(i32, i32)>>,
}

#[derive(Serialize)]
pub struct StateDump {
    number: usize,
    kind: &'static str,
    rule_index: i32,
    decision: Option<i32>,
    non_greedy: bool,
    end_state: Option<usize>,
    start_state: Option<usize>,
    loop_back_state: Option<usize>,
    stop_state: Option<usize>,
    epsilon_only: bool,
    transitions: Vec<String>,
}

impl From<&Atn> for AtnDump {
    fn from(atn: &Atn) -> Self {
        let states = atn
            .states
            .iter()
            .map(|slot| {
                slot.as_ref().map(|s| StateDump {
                    number: s.number,
                    kind: s.kind.name(),
                    rule_index: s.rule_index,
                    decision: s.kind.decision().map(|d| d.number),
                    non_greedy: s.kind.decision().is_some_and(|d| d.non_greedy),
                    end_state: s.kind.end_state(),
                    start_state: match s.kind {
                        StateKind::BlockEnd { start_state } => start_state,
                        _ => None,
                    },
                    loop_back_state: match s.kind {
                        StateKind::PlusBlockStart {
                            loop_back_state, ..
                        }
                        | StateKind::StarLoopEntry {
                            loop_back_state, ..
                        }
                        | StateKind::LoopEnd { loop_back_state } => loop_back_state,
                        _ => None,
                    },
                    stop_state: match s.kind {
                        StateKind::RuleStart { stop_state, .. } => stop_state,
                        _ => None,
                    },
                    epsilon_only: s.epsilon_only_transitions,
                    transitions: s.transitions.iter().map(|t| t.to_string()).collect(),
                })
            })
            .collect();

        Self {
            grammar: match atn.grammar {
                GrammarKind::Lexer => "lexer",
                GrammarKind::Parser => "parser",
            },
            max_token_type: atn.max_token_type,
            states,
            rule_to_start_state: atn.rule_to_start_state.clone(),
            rule_to_stop_state: atn.rule_to_stop_state.clone(),
            rule_to_token_type: atn.rule_to_token_type.clone(),
            rule_to_action_index: atn.rule_to_action_index.clone(),
            mode_to_start_state: atn.mode_to_start_state.clone(),
            decision_to_state: atn.decision_to_state.clone(),
            sets: atn
                .sets
                .iter()
                .map(|s| s.intervals().iter().map(|iv| (iv.lo, iv.hi)).collect())
                .collect(),
        }
    }
}

impl AtnDump {
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Count of materialized states per kind; handy one-line summary for tools.
pub fn kind_histogram(atn: &Atn) -> HashMap<&'static str, usize> {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for state in atn.states.iter().flatten() {
        *counts.entry(state.kind.name()).or_insert(0) += 1;
    }
    counts
}
