//! Rule-bypass rewrite tests: each parser rule gets wrapped in a fresh
//! block-start/block-end pair plus a match state carrying its synthetic
//! token type, and the graph must still verify afterwards.

use atnkit::atn::uuid::SERIALIZED_UUID;
use atnkit::atn::verify::verify;
use atnkit::atn::{
    AtnDeserializer, AtnError, DeserializeOptions, StateKind, StateTag, Transition, TransitionTag,
};

const LEXER: u16 = 0;
const PARSER: u16 = 1;

const BASIC: u16 = StateTag::Basic as u16;
const RULE_START: u16 = StateTag::RuleStart as u16;
const STAR_BLOCK_START: u16 = StateTag::StarBlockStart as u16;
const TOKEN_START: u16 = StateTag::TokenStart as u16;
const RULE_STOP: u16 = StateTag::RuleStop as u16;
const BLOCK_END: u16 = StateTag::BlockEnd as u16;
const STAR_LOOP_BACK: u16 = StateTag::StarLoopBack as u16;
const STAR_LOOP_ENTRY: u16 = StateTag::StarLoopEntry as u16;
const LOOP_END: u16 = StateTag::LoopEnd as u16;

const EPS: u16 = TransitionTag::Epsilon as u16;
const RULE: u16 = TransitionTag::Rule as u16;
const ATOM: u16 = TransitionTag::Atom as u16;
const SET: u16 = TransitionTag::Set as u16;

fn encode(units: &[u16]) -> Vec<u16> {
    let mut out = units.to_vec();
    for u in out.iter_mut().skip(1) {
        *u = u.wrapping_add(2);
    }
    out
}

fn header(grammar: u16, max_token_type: u16) -> Vec<u16> {
    let mut units = vec![3];
    units.extend_from_slice(&SERIALIZED_UUID.to_units());
    units.push(grammar);
    units.push(max_token_type);
    units
}

fn decode_with_bypass(units: &[u16]) -> Result<atnkit::atn::Atn, AtnError> {
    AtnDeserializer::with_options(DeserializeOptions {
        verify: true,
        generate_rule_bypass: true,
    })
    .deserialize(&encode(units))
}

/// Two parser rules; rule 0 invokes rule 1 and resumes at state 4.
fn rule_invocation_units() -> Vec<u16> {
    let mut u = header(PARSER, 2);
    u.push(5); // nstates
    u.extend_from_slice(&[RULE_START, 0]); // 0
    u.extend_from_slice(&[RULE_STOP, 0]); // 1
    u.extend_from_slice(&[RULE_START, 1]); // 2
    u.extend_from_slice(&[RULE_STOP, 1]); // 3
    u.extend_from_slice(&[BASIC, 0]); // 4
    u.extend_from_slice(&[0, 0]);
    u.extend_from_slice(&[2, 0, 2]); // two rules: starts 0 and 2
    u.push(0);
    u.push(0);
    u.push(3);
    u.extend_from_slice(&[0, 4, RULE, 2, 1, 0]);
    u.extend_from_slice(&[2, 3, EPS, 0, 0, 0]);
    u.extend_from_slice(&[4, 1, EPS, 0, 0, 0]);
    u.push(0);
    u
}

#[test]
fn bypass_wraps_every_parser_rule() {
    let atn = decode_with_bypass(&rule_invocation_units()).expect("bypass rewrite should succeed");

    // Three fresh states per rule, appended in rule order.
    assert_eq!(atn.states.len(), 5 + 3 * 2);

    // Synthetic token types sit just past the grammar's real ones.
    assert_eq!(atn.rule_to_token_type, vec![3, 4]);

    // Rule 0: bypass start 5, bypass stop 6, match state 7.
    assert!(matches!(
        atn.state(5).unwrap().kind,
        StateKind::BasicBlockStart {
            end_state: Some(6),
            ..
        }
    ));
    assert!(matches!(
        atn.state(6).unwrap().kind,
        StateKind::BlockEnd {
            start_state: Some(5)
        }
    ));
    assert_eq!(atn.decision_to_state, vec![5, 8]);
    assert_eq!(atn.state(5).unwrap().kind.decision().unwrap().number, 0);
    assert_eq!(atn.state(8).unwrap().kind.decision().unwrap().number, 1);

    // The rule start's edges moved onto the bypass start; the start keeps a
    // single epsilon into the block.
    assert_eq!(
        atn.state(0).unwrap().transitions,
        vec![Transition::Epsilon { target: 5 }]
    );
    assert_eq!(
        atn.state(5).unwrap().transitions,
        vec![
            Transition::Rule {
                target: 2,
                rule_index: 1,
                precedence: 0,
                follow_state: 4
            },
            Transition::Epsilon { target: 7 },
        ]
    );

    // Edges that used to finish at the rule stop now finish at the bypass
    // stop, which exits into the real stop.
    assert_eq!(
        atn.state(4).unwrap().transitions,
        vec![Transition::Epsilon { target: 6 }]
    );
    assert_eq!(
        atn.state(6).unwrap().transitions,
        vec![Transition::Epsilon { target: 1 }]
    );

    // The match state short-circuits the body with the synthetic token.
    assert_eq!(
        atn.state(7).unwrap().transitions,
        vec![Transition::Atom {
            target: 6,
            label: 3
        }]
    );

    // Rule 1 got the same treatment.
    assert_eq!(
        atn.state(2).unwrap().transitions,
        vec![Transition::Epsilon { target: 8 }]
    );
    assert_eq!(
        atn.state(8).unwrap().transitions,
        vec![
            Transition::Epsilon { target: 9 },
            Transition::Epsilon { target: 10 },
        ]
    );
    assert_eq!(
        atn.state(10).unwrap().transitions,
        vec![Transition::Atom {
            target: 9,
            label: 4
        }]
    );

    // The derived follow edge survives on rule 1's stop state.
    assert_eq!(
        atn.state(3).unwrap().transitions,
        vec![Transition::Epsilon { target: 4 }]
    );

    verify(&atn).expect("rewritten graph should still verify");
}

/// A left-recursive rule shaped the way the compiler emits it: primary
/// prefix, then a star loop whose body re-enters the recursion.
fn precedence_rule_units() -> Vec<u16> {
    let mut u = header(PARSER, 2);
    u.push(9);
    u.extend_from_slice(&[RULE_START, 0]); // 0
    u.extend_from_slice(&[RULE_STOP, 0]); // 1
    u.extend_from_slice(&[BASIC, 0]); // 2, primary prefix
    u.extend_from_slice(&[STAR_LOOP_ENTRY, 0]); // 3
    u.extend_from_slice(&[STAR_BLOCK_START, 0, 6]); // 4, end = 6
    u.extend_from_slice(&[BASIC, 0]); // 5, operator + operand
    u.extend_from_slice(&[BLOCK_END, 0]); // 6
    u.extend_from_slice(&[STAR_LOOP_BACK, 0]); // 7
    u.extend_from_slice(&[LOOP_END, 0, 7]); // 8, loop-back = 7
    u.push(0); // non-greedy
    u.extend_from_slice(&[1, 0]); // rule 0 is a precedence rule
    u.extend_from_slice(&[1, 0]); // one rule starting at 0
    u.push(0);
    u.push(0);
    u.push(9);
    u.extend_from_slice(&[0, 2, EPS, 0, 0, 0]);
    u.extend_from_slice(&[2, 3, EPS, 0, 0, 0]);
    u.extend_from_slice(&[3, 4, EPS, 0, 0, 0]);
    u.extend_from_slice(&[3, 8, EPS, 0, 0, 0]);
    u.extend_from_slice(&[4, 5, EPS, 0, 0, 0]);
    u.extend_from_slice(&[5, 6, ATOM, 1, 0, 0]);
    u.extend_from_slice(&[6, 7, EPS, 0, 0, 0]);
    u.extend_from_slice(&[7, 3, EPS, 0, 0, 0]); // loop-back re-entry
    u.extend_from_slice(&[8, 1, EPS, 0, 0, 0]);
    u.extend_from_slice(&[1, 3]); // one decision: the loop entry
    u
}

#[test]
fn bypass_wraps_only_the_precedence_prefix() {
    let atn =
        decode_with_bypass(&precedence_rule_units()).expect("precedence bypass should succeed");

    assert_eq!(atn.states.len(), 9 + 3);
    assert_eq!(atn.rule_to_token_type, vec![3]);
    assert_eq!(atn.decision_to_state, vec![3, 9]);

    // The loop re-entry edge is the excluded one: it still targets the star
    // loop entry, while the prefix edge was captured by the bypass stop.
    assert_eq!(
        atn.state(7).unwrap().transitions,
        vec![Transition::Epsilon { target: 3 }]
    );
    assert_eq!(
        atn.state(2).unwrap().transitions,
        vec![Transition::Epsilon { target: 10 }]
    );

    assert_eq!(
        atn.state(0).unwrap().transitions,
        vec![Transition::Epsilon { target: 9 }]
    );
    assert_eq!(
        atn.state(9).unwrap().transitions,
        vec![
            Transition::Epsilon { target: 2 },
            Transition::Epsilon { target: 11 },
        ]
    );
    assert_eq!(
        atn.state(10).unwrap().transitions,
        vec![Transition::Epsilon { target: 3 }]
    );
    assert_eq!(
        atn.state(11).unwrap().transitions,
        vec![Transition::Atom {
            target: 10,
            label: 3
        }]
    );

    verify(&atn).expect("rewritten graph should still verify");
}

#[test]
fn precedence_rule_without_loop_shape_is_rejected() {
    let mut u = header(PARSER, 1);
    u.push(2);
    u.extend_from_slice(&[RULE_START, 0]);
    u.extend_from_slice(&[RULE_STOP, 0]);
    u.push(0);
    u.extend_from_slice(&[1, 0]); // flagged precedence, but no star loop
    u.extend_from_slice(&[1, 0]);
    u.push(0);
    u.push(0);
    u.push(1);
    u.extend_from_slice(&[0, 1, EPS, 0, 0, 0]);
    u.push(0);
    let err = decode_with_bypass(&u).unwrap_err();
    assert!(matches!(err, AtnError::UnsupportedSchema(_)), "{err}");
}

#[test]
fn lexer_atns_are_left_alone() {
    let mut u = header(LEXER, 1);
    u.push(4);
    u.extend_from_slice(&[TOKEN_START, 0xFFFF]);
    u.extend_from_slice(&[RULE_START, 0]);
    u.extend_from_slice(&[BASIC, 0]);
    u.extend_from_slice(&[RULE_STOP, 0]);
    u.extend_from_slice(&[0, 0]);
    u.extend_from_slice(&[1, 1, 1, 0xFFFF]);
    u.extend_from_slice(&[1, 0]);
    u.extend_from_slice(&[1, 1, 0, 97, 122]);
    u.push(2);
    u.extend_from_slice(&[1, 2, SET, 0, 0, 0]);
    u.extend_from_slice(&[2, 3, EPS, 0, 0, 0]);
    u.push(0);
    let atn = decode_with_bypass(&u).expect("lexer payload should deserialize");
    assert_eq!(atn.states.len(), 4, "no bypass states for a lexer");
    assert_eq!(atn.rule_to_token_type, vec![1]);
}

#[test]
fn bypass_on_an_empty_parser_is_a_no_op() {
    let mut u = header(PARSER, 0);
    u.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
    let atn = decode_with_bypass(&u).expect("empty parser should deserialize");
    assert!(atn.states.is_empty());
    assert!(atn.rule_to_token_type.is_empty());
}
