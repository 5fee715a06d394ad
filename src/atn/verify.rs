// src/atn/verify.rs
// Structural invariants the rest of the runtime leans on. Run after assembly
// and again after the bypass rewrite; a pass over a valid graph changes
// nothing, so re-running is always safe.

use super::Atn;
use super::error::AtnError;
use super::states::{AtnState, StateKind};

/// Walk every state and check the cross-referential invariants. Any
/// violation is fatal.
pub fn verify(atn: &Atn) -> Result<(), AtnError> {
    for state in atn.states.iter().flatten() {
        check_transition_discipline(state)?;

        match state.kind {
            StateKind::PlusBlockStart {
                loop_back_state, ..
            } => {
                check(
                    loop_back_state.is_some(),
                    state,
                    "plus block start has no loop-back state",
                )?;
            }
            StateKind::StarLoopEntry {
                loop_back_state,
                decision,
            } => {
                check(
                    loop_back_state.is_some(),
                    state,
                    "star loop entry has no loop-back state",
                )?;
                check(
                    state.transitions.len() == 2,
                    state,
                    "star loop entry must have exactly two transitions",
                )?;
                let first = target_kind(atn, state, 0)?;
                let second = target_kind(atn, state, 1)?;
                match (first, second) {
                    (StateKind::StarBlockStart { .. }, StateKind::LoopEnd { .. }) => {
                        check(
                            !decision.non_greedy,
                            state,
                            "greedy star loop entry marked non-greedy",
                        )?;
                    }
                    (StateKind::LoopEnd { .. }, StateKind::StarBlockStart { .. }) => {
                        check(
                            decision.non_greedy,
                            state,
                            "non-greedy star loop entry not marked non-greedy",
                        )?;
                    }
                    _ => {
                        return Err(structural(
                            state,
                            "star loop entry transitions must reach a star block start and a loop end",
                        ));
                    }
                }
            }
            StateKind::StarLoopback => {
                check(
                    state.transitions.len() == 1,
                    state,
                    "star loop-back must have exactly one transition",
                )?;
                check(
                    matches!(target_kind(atn, state, 0)?, StateKind::StarLoopEntry { .. }),
                    state,
                    "star loop-back must lead to a star loop entry",
                )?;
            }
            StateKind::LoopEnd { loop_back_state } => {
                check(
                    loop_back_state.is_some(),
                    state,
                    "loop end has no loop-back state",
                )?;
            }
            StateKind::RuleStart { stop_state, .. } => {
                check(stop_state.is_some(), state, "rule start has no stop state")?;
            }
            StateKind::BlockEnd { start_state } => {
                check(
                    start_state.is_some(),
                    state,
                    "block end has no block start",
                )?;
            }
            _ => {}
        }

        if state.kind.is_block_start() {
            check(
                state.kind.end_state().is_some(),
                state,
                "block start has no end state",
            )?;
        }
    }
    Ok(())
}

/// A state either branches through epsilons only or matches at most one
/// thing. Rule stops (which collect derived follow edges) and numbered
/// decision states are the two sanctioned exceptions.
fn check_transition_discipline(state: &AtnState) -> Result<(), AtnError> {
    let exempt = matches!(state.kind, StateKind::RuleStop)
        || state.kind.decision().is_some_and(|d| d.number >= 0);
    if exempt {
        return Ok(());
    }
    check(
        state.epsilon_only_transitions || state.transitions.len() <= 1,
        state,
        "state mixes multiple non-epsilon transitions",
    )
}

fn target_kind<'a>(
    atn: &'a Atn,
    state: &AtnState,
    index: usize,
) -> Result<&'a StateKind, AtnError> {
    let target = state.transitions[index].target();
    atn.state(target)
        .map(|s| &s.kind)
        .ok_or_else(|| structural(state, "transition targets a missing state"))
}

fn check(condition: bool, state: &AtnState, what: &str) -> Result<(), AtnError> {
    if condition {
        Ok(())
    } else {
        Err(structural(state, what))
    }
}

fn structural(state: &AtnState, what: &str) -> AtnError {
    AtnError::Structural(format!(
        "state {} ({}): {what}",
        state.number,
        state.kind.name()
    ))
}
