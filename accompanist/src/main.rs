// Accompanist CLI entry point.
//
// Reads a melody from a MIDI file, evolves a chord accompaniment, and writes
// the melody plus a new accompaniment track to a second MIDI file.
// The pipeline: read MIDI → detect key → evolve chords → write MIDI.
//
// Usage:
//   cargo run -p accompanist -- <input.mid> [output.mid] [--population N]
//     [--iterations N] [--seed N] [--config FILE.json] [--mutation-table gated|flat]
//     [--framing-bonus] [--bar-ticks N]
//
// Log verbosity follows RUST_LOG (default: info).

use accompanist::accompaniment::harmonize;
use accompanist::chord::MutationTable;
use accompanist::config::AccompanimentConfig;
use accompanist::midi::{
    RenderParams, default_output_path, melody_from_smf, parse, render_accompaniment, write_smf,
};
use anyhow::{Context, Result, anyhow, bail};
use std::path::{Path, PathBuf};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    setup_tracing()?;

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let positional = positional_args(&args);
    let Some(input) = positional.first().map(PathBuf::from) else {
        print_usage();
        bail!("missing input MIDI file");
    };
    let output = positional
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output_path(&input));

    let config = build_config(&args)?;

    println!("=== Accompanist ===");
    println!("Input: {}", input.display());
    println!("Output: {}", output.display());
    println!("Population: {}", config.population_size);
    println!("Generations: {}", config.iterations);
    println!();

    println!("[1/3] Reading melody...");
    let bytes =
        std::fs::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
    let smf = parse(&bytes).with_context(|| format!("failed to parse {}", input.display()))?;
    let melody = melody_from_smf(&smf, config.bar_ticks)?;
    println!(
        "  {} notes, {} bars, pitch classes {}",
        melody.notes().len(),
        melody.duration_in_bars(),
        melody.unique_pitch_classes()
    );

    println!("[2/3] Evolving accompaniment...");
    let accompaniment = harmonize(&melody, &config)?;
    let evolution = &accompaniment.evolution;
    println!("  Key: {}", accompaniment.key.name());
    println!("  Seed: {}", accompaniment.seed);
    if let (Some(first), Some(last)) = (
        evolution.best_fitness_history.first(),
        evolution.best_fitness_history.last(),
    ) {
        println!(
            "  Best fitness: {} -> {} over {} generations",
            first, last, evolution.generations
        );
    }
    let names: Vec<String> = accompaniment
        .chords()
        .chords()
        .iter()
        .map(|c| c.name())
        .collect();
    println!("  Chords: {}", names.join(" | "));

    println!("[3/3] Writing MIDI to {}...", output.display());
    let params = RenderParams::for_melody(&melody, config.program);
    let rendered = render_accompaniment(&smf, &accompaniment.tones(), &params);
    write_smf(&rendered, &output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("  Done!");

    Ok(())
}

fn setup_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to initialise tracing: {err}"))
}

/// Start from `--config` (or defaults) and apply flag overrides.
fn build_config(args: &[String]) -> Result<AccompanimentConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => AccompanimentConfig::load(Path::new(path))
            .with_context(|| format!("failed to load config {path}"))?,
        None => AccompanimentConfig::default(),
    };

    if let Some(n) = parse_flag(args, "--population")? {
        config.population_size = n;
    }
    if let Some(n) = parse_flag(args, "--iterations")? {
        config.iterations = n;
    }
    if let Some(seed) = parse_flag(args, "--seed")? {
        config.seed = Some(seed);
    }
    if let Some(ticks) = parse_flag(args, "--bar-ticks")? {
        config.bar_ticks = Some(ticks);
    }
    if let Some(table) = flag_value(args, "--mutation-table") {
        config.mutation_table = match table.to_lowercase().as_str() {
            "gated" => MutationTable::Gated,
            "flat" => MutationTable::Flat,
            other => bail!("unknown mutation table '{other}' (expected gated or flat)"),
        };
    }
    if args.iter().any(|a| a == "--framing-bonus") {
        config.fitness.tonic_framing = true;
    }

    config.validate()?;
    Ok(config)
}

/// Flags that take a value; their values are not positional arguments.
const VALUE_FLAGS: [&str; 6] = [
    "--population",
    "--iterations",
    "--seed",
    "--config",
    "--mutation-table",
    "--bar-ticks",
];

fn positional_args(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUE_FLAGS.contains(&arg) {
            i += 2;
            continue;
        }
        if !arg.starts_with("--") {
            out.push(arg);
        }
        i += 1;
    }
    out
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match flag_value(args, flag) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{flag} requires a valid number, got '{v}'")),
        None => Ok(None),
    }
}

fn print_usage() {
    println!("Usage: accompany <input.mid> [output.mid] [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --population <N>        Chromosomes per generation (default: 100)");
    println!("  --iterations <N>        Generations to evolve (default: 200)");
    println!("  --seed <N>              RNG seed for reproducible output");
    println!("  --config <FILE>         JSON config file; flags override it");
    println!("  --mutation-table <T>    gated (default) or flat");
    println!("  --framing-bonus         Reward chords rooted on the first/last melody note");
    println!("  --bar-ticks <N>         Override the bar length in ticks");
    println!("  --help, -h              Show this help");
}
