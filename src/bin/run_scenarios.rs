//! Scenario runner CLI
//!
//! Usage:
//!   cargo run                                  # Run all scenarios
//!   cargo run -- vegetation/                   # Run category
//!   cargo run -- vegetation/altitude_filter    # Run single scenario
//!   cargo run -- --verbose                     # Show every result line
//!   cargo run -- --db runs.db                  # Record the run to SQLite

use bevy::log::{info, warn};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use editor_harness::adapter::{EditorAdapter, LogService};
use editor_harness::constants::SETTINGS_FILE;
use editor_harness::harness::{ScenarioReport, ScenarioRunner, ScriptedScenario, parse_scenario_file};
use editor_harness::settings::HarnessSettings;
use editor_harness::sim::SimulatedEditor;
use editor_harness::store::ResultStore;

#[derive(Parser, Debug)]
#[command(version, about = "Run TOML editor scenarios against the simulated editor")]
struct Args {
    /// Only run scenarios whose relative path contains this text
    filter: Option<String>,

    /// Print every result line, not just failures
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, value_name = "DIR")]
    scenarios_dir: Option<PathBuf>,

    /// Record sessions, scenarios and results to this SQLite file
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    #[arg(long, value_name = "FILE", default_value = SETTINGS_FILE)]
    settings: PathBuf,

    /// Simulated editor tick in milliseconds
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let args = Args::parse();
    let mut settings = HarnessSettings::load(&args.settings);
    if let Some(tick_ms) = args.tick_ms {
        settings.tick_ms = tick_ms;
    }

    println!("Editor Scenarios");
    println!("================\n");

    let scenarios_path = args
        .scenarios_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.scenarios_dir));
    if !scenarios_path.exists() {
        println!("No scenarios directory found at {}", scenarios_path.display());
        return ExitCode::FAILURE;
    }

    let scenarios = discover_scenarios(&scenarios_path, args.filter.as_deref());
    if scenarios.is_empty() {
        println!("No scenario files found.");
        if let Some(f) = &args.filter {
            println!("Filter: {}", f);
        }
        return ExitCode::FAILURE;
    }

    let mut recorder = match open_recorder(args.db.as_deref(), &settings) {
        Ok(recorder) => recorder,
        Err(e) => {
            println!("Failed to open result database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let editor = SimulatedEditor::spawn(settings.sim_config());
    let runner = ScenarioRunner::new(&editor).with_poller(settings.poller());

    let mut passed = 0;
    let mut failed = 0;
    let mut errors = 0;
    let mut current_category = String::new();

    for path in &scenarios {
        let rel_path = path.strip_prefix(&scenarios_path).unwrap_or(path);
        let category = rel_path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        if category != current_category && !category.is_empty() {
            if !current_category.is_empty() {
                println!();
            }
            println!("{}/", category);
            current_category = category.clone();
        }

        let name = rel_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let definition = match parse_scenario_file(path) {
            Ok(def) => def,
            Err(e) => {
                print_line(&name, "ERROR");
                println!("    {}", e);
                errors += 1;
                continue;
            }
        };

        // Lines left over from the previous scenario are not this one's
        if let Err(e) = editor.read_recent_log_lines() {
            warn!("Could not drain editor log: {}", e);
        }

        let expectations = definition.expect_log.clone();
        let params = definition.params();
        let mut scenario = ScriptedScenario::new(definition);
        let report = runner.run(&mut scenario, params);

        let mut lines = report.lines();
        match editor.read_recent_log_lines() {
            Ok(editor_lines) => lines.extend(editor_lines),
            Err(e) => warn!("Could not read editor log: {}", e),
        }
        let validation = expectations.validate(&lines);

        let ok = report.passed() && validation.passed();
        if ok {
            passed += 1;
        } else {
            failed += 1;
        }
        print_report(&name, &report, ok, validation.problems(), args.verbose);

        if let Some((store, session)) = recorder.as_mut() {
            if !ok {
                match store.last_failure(&report.name) {
                    Ok(Some(previous)) => match &previous.error {
                        Some(error) => println!("    Previously failed (run #{}): {}", previous.id, error),
                        None => println!("    Previously failed (run #{})", previous.id),
                    },
                    Ok(None) => println!("    First recorded failure"),
                    Err(e) => warn!("Could not look up earlier failures of {}: {}", name, e),
                }
            }
            if let Err(e) = store.record_scenario(session, &category, &report) {
                warn!("Failed to record {}: {}", name, e);
            }
        }
    }

    if let Err(e) = editor.shutdown() {
        warn!("Editor shutdown failed: {}", e);
    }

    println!("\n================");
    println!("Results: {} passed, {} failed, {} errors", passed, failed, errors);
    if let Some((_, session)) = &recorder {
        println!("Recorded session {}", session);
    }

    if failed > 0 || errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Store plus session id, when a database path was given
fn open_recorder(
    cli_path: Option<&Path>,
    settings: &HarnessSettings,
) -> Result<Option<(ResultStore, String)>, editor_harness::store::StoreError> {
    let path = match (cli_path, &settings.db_path) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(path)) => PathBuf::from(path),
        (None, None) => return Ok(None),
    };
    let store = ResultStore::open(&path)?;
    let settings_json = serde_json::to_string(settings)?;
    let session = store.create_session("run-scenarios", Some(&settings_json))?;
    info!("Recording to {} (session {})", path.display(), session);
    Ok(Some((store, session)))
}

fn discover_scenarios(base: &Path, filter: Option<&str>) -> Vec<PathBuf> {
    let mut scenarios = Vec::new();
    discover_recursive(base, base, filter, &mut scenarios);
    scenarios.sort();
    scenarios
}

fn discover_recursive(base: &Path, current: &Path, filter: Option<&str>, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(current) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            discover_recursive(base, &path, filter, out);
        } else if path.extension().is_some_and(|e| e == "toml") {
            if let Some(f) = filter {
                let rel = path.strip_prefix(base).unwrap_or(&path).to_string_lossy();
                if !rel.contains(f) {
                    continue;
                }
            }
            out.push(path);
        }
    }
}

fn print_line(name: &str, status: &str) {
    let dots = ".".repeat(40 - name.len().min(39));
    println!("  {} {} {}", name, dots, status);
}

fn print_report(
    name: &str,
    report: &ScenarioReport,
    ok: bool,
    log_problems: Vec<String>,
    verbose: bool,
) {
    if ok {
        print_line(name, &format!("PASS ({} ms)", report.duration.as_millis()));
    } else {
        print_line(name, "FAIL");
    }

    if verbose {
        for line in report.lines() {
            println!("    {}", line);
        }
    } else {
        for failure in report.failures() {
            println!("    {}", failure);
        }
    }
    for problem in log_problems {
        println!("    {}", problem);
    }
}
