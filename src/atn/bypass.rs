// src/atn/bypass.rs
// Wraps every parser rule in a synthetic block so tree-pattern machinery can
// match a whole rule by a single made-up token instead of walking its body.
// Each rule gets: a bypass block start (a new decision), a bypass block end
// that inbound edges are redirected to, and a match state carrying the
// rule's synthetic token type.

use super::error::AtnError;
use super::states::{AtnState, Decision, StateKind};
use super::transitions::Transition;
use super::Atn;

pub fn generate_rule_bypass_transitions(atn: &mut Atn) -> Result<(), AtnError> {
    let nrules = atn.rule_to_start_state.len();

    // Synthetic token types live just past the grammar's real ones, one per
    // rule. For parser grammars this table was empty until now.
    let max_token_type = atn.max_token_type;
    atn.rule_to_token_type = (0..nrules)
        .map(|i| max_token_type + i as i32 + 1)
        .collect();

    for rule in 0..nrules {
        rewrite_rule(atn, rule)?;
    }
    Ok(())
}

fn rewrite_rule(atn: &mut Atn, rule: usize) -> Result<(), AtnError> {
    let bypass_start = atn.add_state(Some(AtnState::new(
        StateKind::BasicBlockStart {
            end_state: None,
            decision: Decision::default(),
        },
        rule as i32,
    )));
    let bypass_stop = atn.add_state(Some(AtnState::new(
        StateKind::BlockEnd { start_state: None },
        rule as i32,
    )));

    if let Some(s) = atn.state_mut(bypass_start) {
        s.kind.set_end_state(bypass_stop);
    }
    atn.define_decision_state(bypass_start)?;
    if let Some(AtnState {
        kind: StateKind::BlockEnd { start_state },
        ..
    }) = atn.state_mut(bypass_stop)
    {
        *start_state = Some(bypass_start);
    }

    let rule_start = atn.rule_to_start_state[rule];
    let is_precedence_rule = matches!(
        atn.state(rule_start).map(|s| &s.kind),
        Some(StateKind::RuleStart {
            is_precedence_rule: true,
            ..
        })
    );

    // The state whose inbound edges get captured by the bypass block. For a
    // precedence rule the wrap covers only the primary prefix section, so the
    // end is the recursion loop's entry, and the loop-back's re-entry edge
    // must keep its original target.
    let (end_state, exclude_transition) = if is_precedence_rule {
        let entry = find_precedence_prefix_end(atn, rule)?;
        let loop_back = match atn.state(entry).map(|s| &s.kind) {
            Some(StateKind::StarLoopEntry {
                loop_back_state: Some(lb),
                ..
            }) => *lb,
            _ => {
                return Err(AtnError::Structural(format!(
                    "star loop entry {entry} has no loop-back state"
                )));
            }
        };
        if atn.state(loop_back).is_none_or(|s| s.transitions.is_empty()) {
            return Err(AtnError::Structural(format!(
                "loop-back state {loop_back} has no transitions"
            )));
        }
        (entry, Some((loop_back, 0usize)))
    } else {
        let stop = atn.rule_to_stop_state[rule].ok_or_else(|| {
            AtnError::Structural(format!("rule {rule} has no stop state to bypass"))
        })?;
        (stop, None)
    };

    // Redirect everything that used to finish at the end state into the
    // bypass stop (sparing the excluded loop re-entry edge).
    for s in 0..atn.states.len() {
        let Some(state) = atn.states[s].as_mut() else {
            continue;
        };
        for (ti, t) in state.transitions.iter_mut().enumerate() {
            if exclude_transition == Some((s, ti)) {
                continue;
            }
            if t.target() == end_state {
                t.set_target(bypass_stop);
            }
        }
    }

    // Everything that used to leave the rule start leaves the bypass start
    // instead, moved last-to-first.
    let mut drained = match atn.state_mut(rule_start) {
        Some(s) => std::mem::take(&mut s.transitions),
        None => Vec::new(),
    };
    if let Some(bs) = atn.state_mut(bypass_start) {
        while let Some(t) = drained.pop() {
            bs.add_transition(t);
        }
    }

    if let Some(s) = atn.state_mut(rule_start) {
        s.add_transition(Transition::Epsilon {
            target: bypass_start,
        });
    }
    if let Some(s) = atn.state_mut(bypass_stop) {
        s.add_transition(Transition::Epsilon { target: end_state });
    }

    let match_state = atn.add_state(Some(AtnState::new(StateKind::Basic, -1)));
    let label = atn.rule_to_token_type[rule];
    if let Some(s) = atn.state_mut(match_state) {
        s.add_transition(Transition::Atom {
            target: bypass_stop,
            label,
        });
    }
    if let Some(s) = atn.state_mut(bypass_start) {
        s.add_transition(Transition::Epsilon {
            target: match_state,
        });
    }

    Ok(())
}

/// Locate the star loop entry that closes a precedence rule's primary prefix
/// section: it belongs to the rule, its last transition reaches a loop end,
/// and that loop end exits straight into the rule's stop state.
fn find_precedence_prefix_end(atn: &Atn, rule: usize) -> Result<usize, AtnError> {
    for state in atn.states.iter().flatten() {
        if state.rule_index != rule as i32 {
            continue;
        }
        if !matches!(state.kind, StateKind::StarLoopEntry { .. }) {
            continue;
        }
        let Some(last) = state.transitions.last() else {
            continue;
        };
        let Some(maybe_loop_end) = atn.state(last.target()) else {
            continue;
        };
        if !matches!(maybe_loop_end.kind, StateKind::LoopEnd { .. }) {
            continue;
        }
        let exits_to_stop = maybe_loop_end.transitions.first().is_some_and(|t| {
            matches!(
                atn.state(t.target()).map(|s| &s.kind),
                Some(StateKind::RuleStop)
            )
        });
        if maybe_loop_end.epsilon_only_transitions && exits_to_stop {
            return Ok(state.number);
        }
    }
    Err(AtnError::UnsupportedSchema(
        "couldn't identify the final state of the precedence rule prefix section".into(),
    ))
}
