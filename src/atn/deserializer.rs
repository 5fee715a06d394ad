// src/atn/deserializer.rs
// Rebuilds the runtime automaton graph from the compact integer payload the
// grammar compiler emits. Single pass over the unit stream with side buffers
// for back-references that cannot resolve until the whole arena exists, then
// the fixup passes, verification, and the optional bypass rewrite.

use super::bypass::generate_rule_bypass_transitions;
use super::error::AtnError;
use super::intervals::IntervalSet;
use super::states::{AtnState, StateKind, StateTag};
use super::transitions::{Transition, edge_factory};
use super::uuid::{ADDED_PRECEDENCE_TRANSITIONS, SERIALIZED_UUID, SUPPORTED_UUIDS, Uuid};
use super::verify::verify;
use super::{Atn, GrammarKind, TOKEN_EOF};

/// Payload format version this runtime understands. Schema evolution past
/// this version is expressed through the UUID instead.
pub const SERIALIZED_VERSION: u16 = 3;

/// What to run after the graph is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeserializeOptions {
    /// Check structural invariants before returning (and again after the
    /// bypass rewrite when both are enabled).
    pub verify: bool,
    /// Wrap each parser rule with a bypass block for tree-pattern matching.
    pub generate_rule_bypass: bool,
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self {
            verify: true,
            generate_rule_bypass: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct AtnDeserializer {
    options: DeserializeOptions,
}

impl AtnDeserializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DeserializeOptions) -> Self {
        Self { options }
    }

    /// Decode a full payload into an owned [`Atn`].
    pub fn deserialize(&self, payload: &[u16]) -> Result<Atn, AtnError> {
        let mut r = UnitReader::decode(payload);

        let header = read_header(&mut r)?;
        log::debug!(
            "ATN header: {:?}, max token type {}, uuid {}",
            header.grammar,
            header.max_token_type,
            header.uuid
        );

        let mut atn = Atn::new(header.grammar, header.max_token_type);
        read_states(&mut r, &mut atn, header.supports_precedence_predicates)?;
        read_rules(&mut r, &mut atn)?;
        read_modes(&mut r, &mut atn)?;
        read_sets(&mut r, &mut atn)?;
        read_edges(&mut r, &mut atn)?;

        // Fixups, in this order: stop-state follow edges are derived (they
        // are never serialized), then block pairs and loops are back-linked.
        derive_rule_stop_follow_edges(&mut atn)?;
        link_block_ends(&mut atn)?;
        link_loop_back_states(&mut atn)?;

        read_decisions(&mut r, &mut atn)?;
        if r.remaining() > 0 {
            log::debug!("{} trailing payload units ignored", r.remaining());
        }

        if self.options.verify {
            verify(&atn)?;
        }

        if self.options.generate_rule_bypass && atn.grammar == GrammarKind::Parser {
            generate_rule_bypass_transitions(&mut atn)?;
            if self.options.verify {
                verify(&atn)?;
            }
        }

        Ok(atn)
    }
}

/// Reframe a little-endian byte stream (the on-disk payload form) as code
/// units for [`AtnDeserializer::deserialize`].
pub fn payload_from_le_bytes(bytes: &[u8]) -> Result<Vec<u16>, AtnError> {
    if bytes.len() % 2 != 0 {
        return Err(AtnError::InvalidArgument(format!(
            "payload has odd byte length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect())
}

// -------------------- unit stream --------------------

/// Cursor over the decoded unit stream. Every unit after the first was
/// serialized with a +2 bias; decoding strips it once, up front.
struct UnitReader {
    data: Vec<u16>,
    p: usize,
}

impl UnitReader {
    fn decode(payload: &[u16]) -> Self {
        let mut data = payload.to_vec();
        for u in data.iter_mut().skip(1) {
            *u = u.wrapping_sub(2);
        }
        Self { data, p: 0 }
    }

    fn take(&mut self) -> Result<u16, AtnError> {
        match self.data.get(self.p) {
            Some(&u) => {
                self.p += 1;
                Ok(u)
            }
            None => Err(AtnError::InvalidArgument(format!(
                "truncated payload at unit {}",
                self.p
            ))),
        }
    }

    fn take_usize(&mut self) -> Result<usize, AtnError> {
        Ok(self.take()? as usize)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.p
    }
}

// -------------------- header --------------------

struct Header {
    grammar: GrammarKind,
    max_token_type: i32,
    uuid: Uuid,
    supports_precedence_predicates: bool,
}

fn read_header(r: &mut UnitReader) -> Result<Header, AtnError> {
    let version = r.take()?;
    if version != SERIALIZED_VERSION {
        return Err(AtnError::UnsupportedSchema(format!(
            "could not deserialize ATN with version {version} (expected {SERIALIZED_VERSION})"
        )));
    }

    let mut units = [0u16; 8];
    for u in units.iter_mut() {
        *u = r.take()?;
    }
    let uuid = Uuid::from_units(units);
    if !SUPPORTED_UUIDS.contains(&uuid) {
        return Err(AtnError::UnsupportedSchema(format!(
            "could not deserialize ATN with UUID {uuid} (expected {SERIALIZED_UUID} or a legacy UUID)"
        )));
    }

    let grammar = match r.take()? {
        t if t == GrammarKind::Lexer as u16 => GrammarKind::Lexer,
        t if t == GrammarKind::Parser as u16 => GrammarKind::Parser,
        t => {
            return Err(AtnError::InvalidArgument(format!(
                "unknown grammar type {t}"
            )));
        }
    };
    let max_token_type = r.take()? as i32;

    Ok(Header {
        grammar,
        max_token_type,
        uuid,
        supports_precedence_predicates: super::uuid::is_feature_supported(
            ADDED_PRECEDENCE_TRANSITIONS,
            uuid,
        ),
    })
}

// -------------------- states --------------------

fn read_states(
    r: &mut UnitReader,
    atn: &mut Atn,
    supports_precedence_predicates: bool,
) -> Result<(), AtnError> {
    let nstates = r.take_usize()?;

    // Loop-back and block-end references can point forward; buffer them and
    // resolve once every slot exists.
    let mut loop_back_numbers: Vec<(usize, usize)> = Vec::new();
    let mut end_state_numbers: Vec<(usize, usize)> = Vec::new();

    for _ in 0..nstates {
        let stype = r.take()?;
        let Some(kind) = StateKind::from_tag(stype)? else {
            atn.add_state(None);
            continue;
        };

        let mut rule_index = r.take()? as i32;
        if rule_index == 0xFFFF {
            rule_index = -1;
        }

        let is_block_start = kind.is_block_start();
        let number = atn.add_state(Some(AtnState::new(kind, rule_index)));

        if stype == StateTag::LoopEnd as u16 {
            loop_back_numbers.push((number, r.take_usize()?));
        } else if is_block_start {
            end_state_numbers.push((number, r.take_usize()?));
        }
    }

    for (loop_end, target) in loop_back_numbers {
        check_state_number(atn, target, "loop end back-reference")?;
        if let Some(AtnState {
            kind: StateKind::LoopEnd { loop_back_state },
            ..
        }) = atn.state_mut(loop_end)
        {
            *loop_back_state = Some(target);
        }
    }

    for (block_start, end) in end_state_numbers {
        check_state_number(atn, end, "block end reference")?;
        if let Some(s) = atn.state_mut(block_start) {
            s.kind.set_end_state(end);
        }
    }

    let num_non_greedy = r.take_usize()?;
    for _ in 0..num_non_greedy {
        let s = r.take_usize()?;
        atn.state_mut(s)
            .and_then(|st| st.kind.decision_mut())
            .ok_or_else(|| {
                AtnError::InvalidArgument(format!("non-greedy entry names non-decision state {s}"))
            })?
            .non_greedy = true;
    }

    if supports_precedence_predicates {
        let num_precedence = r.take_usize()?;
        for _ in 0..num_precedence {
            let s = r.take_usize()?;
            match atn.state_mut(s) {
                Some(AtnState {
                    kind:
                        StateKind::RuleStart {
                            is_precedence_rule, ..
                        },
                    ..
                }) => *is_precedence_rule = true,
                _ => {
                    return Err(AtnError::InvalidArgument(format!(
                        "precedence entry names state {s} which is not a rule start"
                    )));
                }
            }
        }
    }

    log::debug!("read {} states", nstates);
    Ok(())
}

// -------------------- rules --------------------

fn read_rules(r: &mut UnitReader, atn: &mut Atn) -> Result<(), AtnError> {
    let nrules = r.take_usize()?;

    for i in 0..nrules {
        let s = r.take_usize()?;
        match atn.state(s).map(|st| &st.kind) {
            Some(StateKind::RuleStart { .. }) => atn.rule_to_start_state.push(s),
            _ => {
                return Err(AtnError::InvalidArgument(format!(
                    "rule {i} start entry names state {s} which is not a rule start"
                )));
            }
        }

        if atn.grammar == GrammarKind::Lexer {
            let mut token_type = r.take()? as i32;
            if token_type == 0xFFFF {
                token_type = TOKEN_EOF;
            }
            atn.rule_to_token_type.push(token_type);

            let mut action_index = r.take()? as i32;
            if action_index == 0xFFFF {
                action_index = -1;
            }
            atn.rule_to_action_index.push(action_index);
        }
    }

    // Stop states aren't serialized per rule; recover them by scanning the
    // arena and pair each with its rule's start state.
    atn.rule_to_stop_state = vec![None; nrules];
    let stops: Vec<(usize, i32)> = atn
        .states
        .iter()
        .flatten()
        .filter(|s| matches!(s.kind, StateKind::RuleStop))
        .map(|s| (s.number, s.rule_index))
        .collect();

    for (stop, rule_index) in stops {
        let ri = usize::try_from(rule_index).ok().filter(|&ri| ri < nrules);
        let Some(ri) = ri else {
            return Err(AtnError::InvalidArgument(format!(
                "rule stop state {stop} names rule {rule_index} but {nrules} rules were read"
            )));
        };
        atn.rule_to_stop_state[ri] = Some(stop);
        let start = atn.rule_to_start_state[ri];
        if let Some(AtnState {
            kind: StateKind::RuleStart { stop_state, .. },
            ..
        }) = atn.state_mut(start)
        {
            *stop_state = Some(stop);
        }
    }

    log::debug!("read {} rules", nrules);
    Ok(())
}

// -------------------- modes --------------------

fn read_modes(r: &mut UnitReader, atn: &mut Atn) -> Result<(), AtnError> {
    let nmodes = r.take_usize()?;
    for i in 0..nmodes {
        let s = r.take_usize()?;
        match atn.state(s).map(|st| &st.kind) {
            Some(StateKind::TokensStart { .. }) => atn.mode_to_start_state.push(s),
            _ => {
                return Err(AtnError::InvalidArgument(format!(
                    "mode {i} names state {s} which is not a tokens start"
                )));
            }
        }
    }
    Ok(())
}

// -------------------- sets --------------------

fn read_sets(r: &mut UnitReader, atn: &mut Atn) -> Result<(), AtnError> {
    let nsets = r.take_usize()?;
    for _ in 0..nsets {
        // Layout quirk kept bit-exact: the interval count comes before the
        // EOF flag, the pairs after both.
        let nintervals = r.take_usize()?;
        let mut set = IntervalSet::new();

        let contains_eof = r.take()? != 0;
        if contains_eof {
            set.add(TOKEN_EOF);
        }

        for _ in 0..nintervals {
            let lo = r.take()? as i32;
            let hi = r.take()? as i32;
            set.add_range(lo, hi);
        }
        atn.sets.push(set);
    }
    Ok(())
}

// -------------------- edges --------------------

fn read_edges(r: &mut UnitReader, atn: &mut Atn) -> Result<(), AtnError> {
    let nedges = r.take_usize()?;
    for _ in 0..nedges {
        let src = r.take_usize()?;
        let trg = r.take_usize()?;
        let ttype = r.take()?;
        let arg1 = r.take()?;
        let arg2 = r.take()?;
        let arg3 = r.take()?;

        check_state_number(atn, trg, "edge target")?;
        let t = edge_factory(ttype, trg, arg1, arg2, arg3, atn.sets.len())?;
        if let Transition::Rule { target, .. } = t {
            check_state_number(atn, target, "rule edge start state")?;
        }

        atn.state_mut(src)
            .ok_or_else(|| AtnError::InvalidArgument(format!("edge source {src} is not a state")))?
            .add_transition(t);
    }
    log::debug!("read {} edges", nedges);
    Ok(())
}

// -------------------- fixups --------------------

/// Rule-stop outgoing edges are reconstructible and therefore never
/// serialized: every rule invocation contributes an epsilon from the invoked
/// rule's stop state to the invocation's follow state.
fn derive_rule_stop_follow_edges(atn: &mut Atn) -> Result<(), AtnError> {
    let mut derived: Vec<(usize, usize)> = Vec::new();
    for state in atn.states.iter().flatten() {
        for t in &state.transitions {
            let Transition::Rule {
                target,
                follow_state,
                ..
            } = *t
            else {
                continue;
            };
            let rule_index = atn
                .state(target)
                .ok_or_else(|| {
                    AtnError::InvalidArgument(format!(
                        "rule edge on state {} targets missing state {target}",
                        state.number
                    ))
                })?
                .rule_index;
            let stop = usize::try_from(rule_index)
                .ok()
                .and_then(|ri| atn.rule_to_stop_state.get(ri).copied().flatten())
                .ok_or_else(|| {
                    AtnError::Structural(format!(
                        "rule {rule_index} has no stop state for a derived follow edge"
                    ))
                })?;
            derived.push((stop, follow_state));
        }
    }

    for (stop, follow) in derived {
        if let Some(s) = atn.state_mut(stop) {
            s.add_transition(Transition::Epsilon { target: follow });
        }
    }
    Ok(())
}

/// Point each block end back at its block start. A block end belongs to
/// exactly one start; a second claimant is a corrupt graph.
fn link_block_ends(atn: &mut Atn) -> Result<(), AtnError> {
    let starts: Vec<(usize, Option<usize>)> = atn
        .states
        .iter()
        .flatten()
        .filter(|s| s.kind.is_block_start())
        .map(|s| (s.number, s.kind.end_state()))
        .collect();

    for (bs, end) in starts {
        let end = end.ok_or_else(|| {
            AtnError::Structural(format!("block start {bs} has no paired end state"))
        })?;
        match atn.state_mut(end).map(|s| &mut s.kind) {
            Some(StateKind::BlockEnd { start_state }) => {
                if start_state.is_some() {
                    return Err(AtnError::Structural(format!(
                        "block end {end} is claimed by more than one block start"
                    )));
                }
                *start_state = Some(bs);
            }
            _ => {
                return Err(AtnError::Structural(format!(
                    "block start {bs} pairs with state {end} which is not a block end"
                )));
            }
        }
    }
    Ok(())
}

/// Loop-back states know their loop heads through ordinary transitions; push
/// that knowledge onto the heads, which need it for prediction.
fn link_loop_back_states(atn: &mut Atn) -> Result<(), AtnError> {
    let mut plus_links: Vec<(usize, usize)> = Vec::new();
    let mut star_links: Vec<(usize, usize)> = Vec::new();

    for state in atn.states.iter().flatten() {
        match state.kind {
            StateKind::PlusLoopback { .. } => {
                for t in &state.transitions {
                    if let Some(StateKind::PlusBlockStart { .. }) =
                        atn.state(t.target()).map(|s| &s.kind)
                    {
                        plus_links.push((t.target(), state.number));
                    }
                }
            }
            StateKind::StarLoopback => {
                for t in &state.transitions {
                    if let Some(StateKind::StarLoopEntry { .. }) =
                        atn.state(t.target()).map(|s| &s.kind)
                    {
                        star_links.push((t.target(), state.number));
                    }
                }
            }
            _ => {}
        }
    }

    for (target, loopback) in plus_links {
        if let Some(AtnState {
            kind: StateKind::PlusBlockStart {
                loop_back_state, ..
            },
            ..
        }) = atn.state_mut(target)
        {
            *loop_back_state = Some(loopback);
        }
    }
    for (target, loopback) in star_links {
        if let Some(AtnState {
            kind: StateKind::StarLoopEntry {
                loop_back_state, ..
            },
            ..
        }) = atn.state_mut(target)
        {
            *loop_back_state = Some(loopback);
        }
    }
    Ok(())
}

// -------------------- decisions --------------------

fn read_decisions(r: &mut UnitReader, atn: &mut Atn) -> Result<(), AtnError> {
    let ndecisions = r.take_usize()?;
    for _ in 0..ndecisions {
        let s = r.take_usize()?;
        atn.define_decision_state(s)?;
    }
    Ok(())
}

// -------------------- shared checks --------------------

fn check_state_number(atn: &Atn, number: usize, what: &str) -> Result<(), AtnError> {
    if number >= atn.states.len() {
        return Err(AtnError::InvalidArgument(format!(
            "{what} names state {number} but only {} states were read",
            atn.states.len()
        )));
    }
    Ok(())
}
