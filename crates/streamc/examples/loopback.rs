//! Lossy loopback: stream a generated payload through an encoder and
//! decoder over a simulated channel that drops packets at random, with
//! acknowledgments flowing back every step.
//!
//! ```text
//! cargo run -p streamc --example loopback -- [params.toml] [loss] [symbols]
//! RUST_LOG=streamc=debug cargo run -p streamc --example loopback
//! ```

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{RngExt as _, SeedableRng};
use serde::Serialize;
use streamc::stats::{DecoderStats, EncoderStats};
use streamc::{Decoder, Encoder, Parameters};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PARAMS: &str = r#"
gf_power = 8
symbol_size = 256
repair_ratio = 3
seed = 7
buffer_size = 32
"#;

#[derive(Serialize)]
struct Report<'a> {
    symbols: usize,
    loss: f64,
    packets_sent: u64,
    packets_dropped: u64,
    encoder: &'a EncoderStats,
    decoder: &'a DecoderStats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let mut args = std::env::args().skip(1);
    let params = match args.next() {
        Some(path) if path.ends_with(".toml") => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {path}"))?;
            Parameters::from_toml_str(&text)?
        }
        _ => Parameters::from_toml_str(DEFAULT_PARAMS)?,
    };
    let loss: f64 = args
        .next()
        .map(|s| s.parse())
        .transpose()
        .context("loss must be a number in [0, 1)")?
        .unwrap_or(0.1);
    let count: usize = args
        .next()
        .map(|s| s.parse())
        .transpose()
        .context("symbols must be a positive integer")?
        .unwrap_or(1000);
    if !(0.0..1.0).contains(&loss) {
        bail!("loss must be in [0, 1), got {loss}");
    }

    info!(
        gf_power = params.gf_power,
        symbol_size = params.symbol_size,
        repair_ratio = params.repair_ratio,
        buffer_size = params.buffer_size,
        loss,
        count,
        "starting loopback"
    );

    let mut channel = StdRng::seed_from_u64(params.seed.wrapping_add(1));
    let data: Vec<Vec<u8>> = (0..count)
        .map(|_| (0..params.symbol_size).map(|_| channel.random()).collect())
        .collect();

    let mut enc = Encoder::new(params.clone())?;
    let mut dec = Decoder::new(params)?;
    let mut pushed = 0;
    let mut sent = 0u64;
    let mut dropped = 0u64;
    let mut received = 0usize;
    // Generous cap so a pathological setting (ratio 0 with loss) ends.
    let budget = (count as u64 + 16) * 64;

    while received < count {
        if sent >= budget {
            warn!(received, count, sent, "giving up, channel too lossy for this repair ratio");
            break;
        }
        while pushed < count && !enc.buffer().is_full() {
            enc.push(&data[pushed])?;
            pushed += 1;
        }
        let Some(packet) = enc.next_packet() else {
            break;
        };
        let wire = enc.serialize(&packet)?;
        sent += 1;
        if channel.random::<f64>() < loss {
            dropped += 1;
            continue;
        }

        let packet = dec.deserialize(&wire)?;
        dec.ingest(packet)?;
        for (id, symbol) in dec.drain_delivered() {
            if symbol[..] != data[id as usize][..] {
                bail!("symbol {id} corrupted");
            }
            received += 1;
        }
        if let Some(ack) = dec.inorder() {
            enc.flush_acked(ack);
        }
    }

    info!(
        received,
        sent,
        dropped,
        overhead = enc.stats().repair_overhead(),
        efficiency = dec.stats().efficiency(),
        "loopback finished"
    );
    let report = Report {
        symbols: received,
        loss,
        packets_sent: sent,
        packets_dropped: dropped,
        encoder: enc.stats(),
        decoder: dec.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
