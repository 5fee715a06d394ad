// src/atn/transitions.rs
// Transition records hanging off each state. Targets and set references are
// plain indices (into the state arena and the ATN's set table); the graph is
// cyclic, so nothing here owns anything.

use std::fmt;

use super::TOKEN_EOF;
use super::error::AtnError;

/// Wire tags for serialized transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TransitionTag {
    Epsilon = 1,
    Range = 2,
    Rule = 3,
    Predicate = 4,
    Atom = 5,
    Action = 6,
    Set = 7,
    NotSet = 8,
    Wildcard = 9,
    Precedence = 10,
}

/// One outgoing edge. `target` is always a state number; `Rule` edges point
/// at the invoked rule's start state and carry the state to resume in
/// (`follow_state`) once the invocation returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Epsilon {
        target: usize,
    },
    Range {
        target: usize,
        lo: i32,
        hi: i32,
    },
    Rule {
        target: usize,
        rule_index: usize,
        precedence: i32,
        follow_state: usize,
    },
    Predicate {
        target: usize,
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    Atom {
        target: usize,
        label: i32,
    },
    Action {
        target: usize,
        rule_index: usize,
        action_index: i32,
        is_ctx_dependent: bool,
    },
    Set {
        target: usize,
        set: usize,
    },
    NotSet {
        target: usize,
        set: usize,
    },
    Wildcard {
        target: usize,
    },
    Precedence {
        target: usize,
        precedence: i32,
    },
}

impl Transition {
    pub fn target(&self) -> usize {
        match *self {
            Transition::Epsilon { target }
            | Transition::Range { target, .. }
            | Transition::Rule { target, .. }
            | Transition::Predicate { target, .. }
            | Transition::Atom { target, .. }
            | Transition::Action { target, .. }
            | Transition::Set { target, .. }
            | Transition::NotSet { target, .. }
            | Transition::Wildcard { target }
            | Transition::Precedence { target, .. } => target,
        }
    }

    pub fn set_target(&mut self, new_target: usize) {
        match self {
            Transition::Epsilon { target }
            | Transition::Range { target, .. }
            | Transition::Rule { target, .. }
            | Transition::Predicate { target, .. }
            | Transition::Atom { target, .. }
            | Transition::Action { target, .. }
            | Transition::Set { target, .. }
            | Transition::NotSet { target, .. }
            | Transition::Wildcard { target }
            | Transition::Precedence { target, .. } => *target = new_target,
        }
    }

    /// Edges the simulator may take without consuming input. Rule, predicate,
    /// precedence, and action edges all count.
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self,
            Transition::Epsilon { .. }
                | Transition::Rule { .. }
                | Transition::Predicate { .. }
                | Transition::Action { .. }
                | Transition::Precedence { .. }
        )
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Transition::Epsilon { target } => write!(f, "eps -> {target}"),
            Transition::Range { target, lo, hi } => write!(f, "range({lo}..={hi}) -> {target}"),
            Transition::Rule {
                target,
                rule_index,
                precedence,
                follow_state,
            } => write!(
                f,
                "rule(#{rule_index} prec={precedence}) -> {target} follow {follow_state}"
            ),
            Transition::Predicate {
                target,
                rule_index,
                pred_index,
                ..
            } => write!(f, "pred({rule_index}:{pred_index}) -> {target}"),
            Transition::Atom { target, label } => write!(f, "atom({label}) -> {target}"),
            Transition::Action {
                target,
                rule_index,
                action_index,
                ..
            } => write!(f, "action({rule_index}:{action_index}) -> {target}"),
            Transition::Set { target, set } => write!(f, "set(#{set}) -> {target}"),
            Transition::NotSet { target, set } => write!(f, "notset(#{set}) -> {target}"),
            Transition::Wildcard { target } => write!(f, "wildcard -> {target}"),
            Transition::Precedence { target, precedence } => {
                write!(f, "precpred({precedence}) -> {target}")
            }
        }
    }
}

/// Build one transition from its six-unit wire form. `trg` is the edge's
/// serialized target; for `Rule` edges it becomes the follow state and the
/// transition instead targets the invoked rule's start state (`arg1`). A
/// nonzero `arg3` on ATOM/RANGE replaces the label with the EOF sentinel.
pub fn edge_factory(
    ttype: u16,
    trg: usize,
    arg1: u16,
    arg2: u16,
    arg3: u16,
    nsets: usize,
) -> Result<Transition, AtnError> {
    let set_ref = |index: u16| -> Result<usize, AtnError> {
        let index = index as usize;
        if index >= nsets {
            return Err(AtnError::InvalidArgument(format!(
                "set transition references set {index} but only {nsets} sets were read"
            )));
        }
        Ok(index)
    };

    let t = match ttype {
        t if t == TransitionTag::Epsilon as u16 => Transition::Epsilon { target: trg },
        t if t == TransitionTag::Range as u16 => Transition::Range {
            target: trg,
            lo: if arg3 != 0 { TOKEN_EOF } else { arg1 as i32 },
            hi: arg2 as i32,
        },
        t if t == TransitionTag::Rule as u16 => Transition::Rule {
            target: arg1 as usize,
            rule_index: arg2 as usize,
            precedence: arg3 as i32,
            follow_state: trg,
        },
        t if t == TransitionTag::Predicate as u16 => Transition::Predicate {
            target: trg,
            rule_index: arg1 as usize,
            pred_index: arg2 as usize,
            is_ctx_dependent: arg3 != 0,
        },
        t if t == TransitionTag::Precedence as u16 => Transition::Precedence {
            target: trg,
            precedence: arg1 as i32,
        },
        t if t == TransitionTag::Atom as u16 => Transition::Atom {
            target: trg,
            label: if arg3 != 0 { TOKEN_EOF } else { arg1 as i32 },
        },
        t if t == TransitionTag::Action as u16 => Transition::Action {
            target: trg,
            rule_index: arg1 as usize,
            action_index: arg2 as i32,
            is_ctx_dependent: arg3 != 0,
        },
        t if t == TransitionTag::Set as u16 => Transition::Set {
            target: trg,
            set: set_ref(arg1)?,
        },
        t if t == TransitionTag::NotSet as u16 => Transition::NotSet {
            target: trg,
            set: set_ref(arg1)?,
        },
        t if t == TransitionTag::Wildcard as u16 => Transition::Wildcard { target: trg },
        _ => {
            return Err(AtnError::InvalidArgument(
                "The specified transition type is not valid.".into(),
            ));
        }
    };

    Ok(t)
}
