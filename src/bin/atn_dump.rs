// src/bin/atn_dump.rs
// Decode a serialized ATN payload file (little-endian u16 stream) and print
// it as JSON, plus a per-kind state summary on stderr.
//
// Knobs:
//   ATN_BYPASS=1      also generate rule bypass transitions (parser ATNs)
//   ATN_NO_VERIFY=1   skip structural verification

use std::fs;

use anyhow::{Context, Result, bail};

use atnkit::atn::dump::{AtnDump, kind_histogram};
use atnkit::atn::{AtnDeserializer, DeserializeOptions, payload_from_le_bytes};

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

fn main() -> Result<()> {
    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: atn_dump <payload.bin>");
    };

    let bytes = fs::read(&path).with_context(|| format!("reading {path}"))?;
    let payload = payload_from_le_bytes(&bytes)?;

    let options = DeserializeOptions {
        verify: !env_flag("ATN_NO_VERIFY"),
        generate_rule_bypass: env_flag("ATN_BYPASS"),
    };
    let atn = AtnDeserializer::with_options(options)
        .deserialize(&payload)
        .with_context(|| format!("deserializing {path}"))?;

    println!("{}", AtnDump::from(&atn).to_json_string()?);

    let mut counts: Vec<(&str, usize)> = kind_histogram(&atn).into_iter().collect();
    counts.sort();
    let summary: Vec<String> = counts.iter().map(|(k, n)| format!("{k}={n}")).collect();
    eprintln!(
        "{} slots ({} live): {}",
        atn.states.len(),
        atn.states.iter().flatten().count(),
        summary.join(" ")
    );
    Ok(())
}
