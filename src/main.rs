//! HUD scenario runner CLI
//!
//! Usage:
//!   hudcheck HUD_001                          # Run one test
//!   hudcheck HUD_001 HUD_002 --ci             # Run several, never prompt
//!   hudcheck HUD_001 --start-from 4           # Skip to scenario 4
//!   hudcheck HUD_001 --bench bench.toml       # Seed the bench rig
//!   hudcheck HUD_001 --external-capture       # Capture with the configured commands

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use hudcheck::config::RunnerConfig;
use hudcheck::rig::Rig;
use hudcheck::rig::bench::BenchRig;
use hudcheck::rig::capture::{CommandCapture, CommandTranscoder};
use hudcheck::scenario::{ConsoleProgress, RunOutcome, RunSummary, run_test};
use hudcheck::verdict::VerdictStatus;

#[derive(Parser)]
#[command(name = "hudcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run HUD scenario workbooks against the test rig", long_about = None)]
struct Cli {
    /// Test names (folders under the tests folder)
    #[arg(required = true)]
    tests: Vec<String>,

    /// Runner settings file (JSON)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Folder holding the tests, overrides the settings
    #[arg(long = "tests")]
    tests_folder: Option<PathBuf>,

    /// Start every scenario sheet at this scenario number
    #[arg(long)]
    start_from: Option<u32>,

    /// Bench seed file (TOML) with readable GDT items, SIM values and frames
    #[arg(long)]
    bench: Option<PathBuf>,

    /// Take screenshots and videos with the configured external commands
    #[arg(long)]
    external_capture: bool,

    /// Never wait for the operator on MSG prompts
    #[arg(long)]
    ci: bool,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

fn build_rig(cli: &Cli, config: &RunnerConfig) -> Result<Rig, String> {
    let names: Vec<&str> = config.gdt_connections.iter().map(String::as_str).collect();
    let bench = match &cli.bench {
        Some(seed) => BenchRig::from_seed(&names, seed).map_err(|e| format!("{}: {}", seed.display(), e))?,
        None => BenchRig::new(&names),
    };
    let (mut rig, _) = bench.into_rig();
    if cli.external_capture {
        rig.capture = Box::new(CommandCapture {
            screenshot: config.screenshot_command.clone(),
            video: config.video_command.clone(),
        });
        rig.transcoder = Box::new(CommandTranscoder {
            template: config.transcode_command.clone(),
        });
    }
    Ok(rig)
}

fn print_summary(summary: &RunSummary) {
    let dots = ".".repeat(40 - summary.test.len().min(39));
    let verdict = match summary.outcome {
        RunOutcome::Cancelled => "CANCELLED".to_string(),
        _ => summary.status().to_string(),
    };
    println!("  {} {} {}", summary.test, dots, verdict);
    println!(
        "    {} passed, {} failed, {} not run",
        summary.count(VerdictStatus::Passed),
        summary.count(VerdictStatus::Failed),
        summary.count(VerdictStatus::NoAutoRun)
    );
    for scenario in summary.scenarios.iter().filter(|s| s.status == VerdictStatus::Failed) {
        println!("    {} scenario {}: FAILED", scenario.sheet, scenario.scenario);
    }
    if let Some(error) = &summary.error {
        println!("    {}", error);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut config = match RunnerConfig::load(cli.settings.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(folder) = &cli.tests_folder {
        config.tests_folder = folder.clone();
    }

    let mut rig = match build_rig(&cli, &config) {
        Ok(rig) => rig,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut progress = ConsoleProgress::new(cli.ci);

    println!("HUD Scenario Tests");
    println!("==================\n");

    let mut passed = 0;
    let mut failed = 0;
    for test in &cli.tests {
        let summary = run_test(test, &config, &mut rig, &mut progress, cli.start_from);
        print_summary(&summary);
        if summary.outcome == RunOutcome::Cancelled {
            failed += 1;
            break;
        }
        if summary.status() == VerdictStatus::Failed {
            failed += 1;
        } else {
            passed += 1;
        }
    }

    println!("\n==================");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
