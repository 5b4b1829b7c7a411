//! Dissemination CLI - run parameter sweeps from JSON configuration.

use std::path::PathBuf;
use std::time::Instant;

use dissemination::{
    runner::JsonLinesSink,
    schema::SweepConfig,
    sweep::run_sweep,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <sweep.json>", args[0]);
        eprintln!();
        eprintln!("Run a cultural dissemination parameter sweep.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  sweep.json  Path to sweep configuration file");
        eprintln!();
        eprintln!("Each finished run is written to stdout as one JSON line.");
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let config = SweepConfig::from_path(&config_path).unwrap_or_else(|e| {
        eprintln!("Error loading sweep: {}", e);
        std::process::exit(1);
    });

    let start = Instant::now();
    let summary = run_sweep(&config, &JsonLinesSink).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    eprintln!(
        "{} of {} runs completed ({} failed) in {:.2}s",
        summary.completed,
        summary.queued,
        summary.failed,
        start.elapsed().as_secs_f32()
    );
    if summary.failed > 0 {
        std::process::exit(1);
    }
}

fn print_example_config() {
    let config = SweepConfig::default();
    println!("Example sweep configuration (sweep.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
