// src/atn/uuid.rs
// Schema identity for serialized ATN payloads. The grammar compiler stamps
// each payload with the UUID of the newest serialization feature it used;
// older UUIDs stay recognized so previously generated payloads keep loading.

use std::fmt;

/// A 128-bit schema UUID, stored as the two halves the wire format ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid {
    msb: u64,
    lsb: u64,
}

impl Uuid {
    pub const fn new(msb: u64, lsb: u64) -> Self {
        Self { msb, lsb }
    }

    /// Assemble from 8 payload code units: the least-significant half first,
    /// each half built little-endian 16 bits at a time.
    pub fn from_units(units: [u16; 8]) -> Self {
        let mut lsb = 0u64;
        let mut msb = 0u64;
        for i in 0..4 {
            lsb |= (units[i] as u64) << (16 * i);
            msb |= (units[i + 4] as u64) << (16 * i);
        }
        Self { msb, lsb }
    }

    /// Inverse of [`Uuid::from_units`]; used by tooling and tests to frame
    /// payloads without hand-writing unit patterns.
    pub fn to_units(self) -> [u16; 8] {
        let mut units = [0u16; 8];
        for i in 0..4 {
            units[i] = (self.lsb >> (16 * i)) as u16;
            units[i + 4] = (self.msb >> (16 * i)) as u16;
        }
        units
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
            self.msb >> 32,
            (self.msb >> 16) & 0xFFFF,
            self.msb & 0xFFFF,
            (self.lsb >> 48) & 0xFFFF,
            self.lsb & 0xFFFF_FFFF_FFFF
        )
    }
}

/// Schema without precedence transitions or lexer actions.
pub const BASE_SERIALIZED_UUID: Uuid = Uuid::new(0x33761B2D_78BB_4A43, 0x8B0B_4F5BEE8AACF3);
/// First schema carrying PRECEDENCE transitions and precedence-rule flags.
pub const ADDED_PRECEDENCE_TRANSITIONS: Uuid = Uuid::new(0x1DA0C57D_6C06_438A, 0x9B27_10BCB3CE0F61);
/// First schema carrying executable lexer actions.
pub const ADDED_LEXER_ACTIONS: Uuid = Uuid::new(0xAADB8D7E_AEEF_4415, 0xAD2B_8204D6CF042E);

/// The UUID new payloads are stamped with.
pub const SERIALIZED_UUID: Uuid = ADDED_LEXER_ACTIONS;

/// Every UUID this runtime can load, ordered by introduction date.
pub const SUPPORTED_UUIDS: [Uuid; 3] = [
    BASE_SERIALIZED_UUID,
    ADDED_PRECEDENCE_TRANSITIONS,
    ADDED_LEXER_ACTIONS,
];

/// A feature is supported by a payload iff the payload's UUID was introduced
/// no earlier than the feature's. Unknown UUIDs support nothing.
pub fn is_feature_supported(feature: Uuid, actual: Uuid) -> bool {
    let pos = |u: Uuid| SUPPORTED_UUIDS.iter().position(|&k| k == u);
    match (pos(feature), pos(actual)) {
        (Some(f), Some(a)) => f <= a,
        _ => false,
    }
}
