// src/bin/fuzz_atn.rs
// Mutate a known-good payload and feed it to the deserializer. Any outcome
// is fine except a panic: corrupted payloads must come back as errors.
//
// Knobs:
//   FUZZ_ITERS=n   number of mutated payloads (default 10000)
//   FUZZ_SEED=n    RNG seed (default 0x41544E)

use rand::{Rng, SeedableRng, rngs::StdRng};

use atnkit::atn::uuid::SERIALIZED_UUID;
use atnkit::atn::{AtnDeserializer, TransitionTag};

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

// +2 bias on everything after the version unit, like the serializer does.
fn encode(units: &[u16]) -> Vec<u16> {
    let mut out = units.to_vec();
    for u in out.iter_mut().skip(1) {
        *u = u.wrapping_add(2);
    }
    out
}

// One lexer rule matching [a-z]: tokens start, rule start/stop, one body
// state, a set edge, and a single decision.
fn baseline_payload() -> Vec<u16> {
    let mut units: Vec<u16> = vec![3];
    units.extend_from_slice(&SERIALIZED_UUID.to_units());
    units.extend_from_slice(&[0, 1]); // lexer, max token type 1
    units.extend_from_slice(&[4, 6, 0xFFFF, 2, 0, 1, 0, 7, 0]); // states
    units.extend_from_slice(&[0, 0]); // non-greedy, precedence
    units.extend_from_slice(&[1, 1, 1, 0xFFFF]); // rule 0: start 1, token 1, no action
    units.extend_from_slice(&[1, 0]); // mode 0 -> state 0
    units.extend_from_slice(&[1, 1, 0, 97, 122]); // one set: [a-z], no EOF
    units.push(3); // edges
    units.extend_from_slice(&[0, 1, TransitionTag::Epsilon as u16, 0, 0, 0]);
    units.extend_from_slice(&[1, 2, TransitionTag::Set as u16, 0, 0, 0]);
    units.extend_from_slice(&[2, 3, TransitionTag::Epsilon as u16, 0, 0, 0]);
    units.extend_from_slice(&[1, 0]); // one decision: state 0
    encode(&units)
}

fn main() {
    let iters = env_u64("FUZZ_ITERS", 10_000);
    let seed = env_u64("FUZZ_SEED", 0x41544E);
    let mut rng = StdRng::seed_from_u64(seed);

    let baseline = baseline_payload();
    let deserializer = AtnDeserializer::new();
    assert!(
        deserializer.deserialize(&baseline).is_ok(),
        "baseline payload must deserialize"
    );

    let mut ok = 0u64;
    let mut rejected = 0u64;
    for _ in 0..iters {
        let mut payload = baseline.clone();
        let flips = rng.random_range(1..=4);
        for _ in 0..flips {
            let i = rng.random_range(0..payload.len());
            payload[i] = rng.random();
        }
        match deserializer.deserialize(&payload) {
            Ok(_) => ok += 1,
            Err(_) => rejected += 1,
        }
    }

    println!("{iters} mutated payloads: {ok} accepted, {rejected} rejected, 0 panics");
}
