// paramgen CLI entry point.
//
// Builds one generator from a literal argument list and prints the values it
// produces, one per line.
//
// Usage:
//   cargo run -p paramgen -- "(ru, 0, (bg, oc, (1, 2)))" [--count N] [--seed N]
//     [--start N] [--config FILE] [--describe] [--check] [-v]
//
// The outer parentheses are optional. `--describe` prints the canonical
// rendering before the values; `--check` runs argument validation and exits
// non-zero on failure. Logs go to stderr; `-v` raises the level.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use paramgen::{Context, Factory, GeneratorConfig};
use tracing::{debug, error};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "paramgen")]
#[command(about = "Build a parameter generator and print what it produces", long_about = None)]
struct Cli {
    /// Generator literal, e.g. "ru, 0, 1"
    literal: String,

    /// Number of values to produce
    #[arg(short = 'n', long, default_value = "20")]
    count: usize,

    /// Factory seed
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// First step value
    #[arg(long, default_value = "0")]
    start: i64,

    /// JSON file overriding loop ceilings and limits
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the canonical rendering before the values
    #[arg(long)]
    describe: bool,

    /// Validate arguments and exit
    #[arg(long)]
    check: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<GeneratorConfig, String> {
    let Some(path) = path else {
        return Ok(GeneratorConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    GeneratorConfig::from_json(&text).map_err(|e| format!("{}: {e}", path.display()))
}

fn run(cli: &Cli) -> Result<ExitCode, String> {
    let config = load_config(cli.config.as_ref())?;
    let mut factory = Factory::with_config(config, cli.seed);
    let mut pmtr = factory.build(&cli.literal).map_err(|e| e.to_string())?;
    debug!(generator = %pmtr, seed = cli.seed, "built");

    if cli.describe {
        println!("{pmtr}");
    }
    if cli.check {
        return Ok(match pmtr.check_args() {
            Ok(()) => {
                println!("ok: {pmtr}");
                ExitCode::SUCCESS
            }
            Err(failure) => {
                println!("{failure}");
                ExitCode::FAILURE
            }
        });
    }

    let ctx = Context::new();
    for i in 0..cli.count as i64 {
        println!("{}", pmtr.produce(cli.start + i, &ctx));
    }
    Ok(ExitCode::SUCCESS)
}
