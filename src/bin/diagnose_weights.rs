//! Checkpoint key diagnostic tool
//!
//! Renames the keys of an original discriminator checkpoint and reports
//! them against what the weight-normalized discriminator expects, without
//! failing on mismatches. Useful when extending the rename table.
//!
//! Usage: cargo run --release --bin diagnose_weights -- --checkpoint D_100000.pth

use anyhow::{Context, Result};
use candle_core::Device;
use clap::Parser;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use vits_convert::convert::{read_checkpoint, IgnorePatterns, DEFAULT_CHECKPOINT_KEY};
use vits_convert::{Reparameterize, RenameTable, StateDict, VitsConfig, VitsDiscriminator};

#[derive(Parser, Debug)]
#[command(name = "diagnose_weights")]
#[command(about = "Compare checkpoint keys against the discriminator layout")]
struct Args {
    /// Original discriminator checkpoint
    #[arg(long)]
    checkpoint: PathBuf,

    /// Generator config.json; MMS defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Top-level entry of the pickled checkpoint holding the state dict
    #[arg(long, default_value = DEFAULT_CHECKPOINT_KEY)]
    checkpoint_key: String,
}

fn check_keys(
    component: &str,
    checkpoint_keys: &BTreeMap<String, Vec<usize>>,
    expected_keys: &BTreeMap<String, Vec<usize>>,
    ignore: &IgnorePatterns,
) {
    println!("\n{}", "=".repeat(60));
    println!("  {} Weight Diagnosis", component);
    println!("{}", "=".repeat(60));

    let mut found = 0;
    let mut missing = Vec::new();
    let mut mismatched = Vec::new();

    for (key, shape) in expected_keys {
        match checkpoint_keys.get(key) {
            Some(actual) if actual == shape => found += 1,
            Some(actual) => mismatched.push((key, shape, actual)),
            None => missing.push(key),
        }
    }

    let expected_set: BTreeSet<_> = expected_keys.keys().collect();
    let unconsumed: Vec<_> = checkpoint_keys
        .keys()
        .filter(|k| !expected_set.contains(k))
        .collect();
    let ignored = missing
        .iter()
        .chain(unconsumed.iter())
        .filter(|k| ignore.matches(k))
        .count();

    println!("  Total expected: {}", expected_keys.len());
    println!("  Found:          {}", found);
    println!("  MISSING:        {}", missing.len());
    println!("  Shape mismatch: {}", mismatched.len());
    println!("  Unconsumed:     {}", unconsumed.len());
    println!("  Ignored:        {}", ignored);

    if !missing.is_empty() {
        println!("\n  MISSING tensors (module expects but checkpoint lacks):");
        for key in &missing {
            println!("    - {}", key);
        }
    }

    if !mismatched.is_empty() {
        println!("\n  SHAPE MISMATCH (module vs checkpoint):");
        for (key, expected, actual) in &mismatched {
            println!("    ~ {} {:?} vs {:?}", key, expected, actual);
        }
    }

    if !unconsumed.is_empty() {
        println!("\n  UNCONSUMED tensors (checkpoint has but module ignores):");
        for key in &unconsumed {
            if let Some(shape) = checkpoint_keys.get(*key) {
                println!("    + {} {:?}", key, shape);
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let device = Device::Cpu;

    let config = match &args.config {
        Some(path) => VitsConfig::load(path).context("Failed to load config")?,
        None => VitsConfig::default(),
    };

    let mut discriminator = VitsDiscriminator::new(&config, &device)?;
    discriminator.apply_weight_norm()?;
    let expected: BTreeMap<String, Vec<usize>> = discriminator
        .named_parameters()
        .into_iter()
        .map(|(k, t)| (k, t.dims().to_vec()))
        .collect();

    let source = read_checkpoint(&args.checkpoint, Some(&args.checkpoint_key), &device)
        .with_context(|| format!("Failed to read {:?}", args.checkpoint))?;

    // Rename key by key so colliding names still show up in the report
    let table = RenameTable::discriminator();
    let renamed: BTreeMap<String, Vec<usize>> = source
        .iter()
        .map(|(k, t)| (table.rename_key(k), t.dims().to_vec()))
        .collect();

    println!("Checkpoint: {:?} ({} tensors)", args.checkpoint, source.len());
    check_keys("Discriminator", &renamed, &expected, &IgnorePatterns::default());

    Ok(())
}
