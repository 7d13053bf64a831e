use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stride_core::*;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "stride")]
#[command(about = "Guided interval running program", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show progress and the next workout (default)
    Status,

    /// Show the full program with completion marks
    Plan,

    /// Run a workout with the guided timer
    Run {
        #[arg(long)]
        week: u32,

        #[arg(long)]
        day: u32,

        /// Run even if the workout is still locked
        #[arg(long)]
        force: bool,
    },

    /// Erase all completion history
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Show finished workouts from the journal
    History {
        /// Export the journal to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    stride_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Plan) => cmd_plan(&data_dir, &config),
        Some(Commands::Run { week, day, force }) => {
            cmd_run(&data_dir, &config, week, day, force).await
        }
        Some(Commands::Reset { yes }) => cmd_reset(&data_dir, yes),
        Some(Commands::History { export }) => cmd_history(&data_dir, export),
        // Default to "status"
        Some(Commands::Status) | None => cmd_status(&data_dir, &config),
    }
}

fn ledger_path(data_dir: &Path) -> PathBuf {
    data_dir.join("progress.json")
}

fn journal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("journal.jsonl")
}

fn load_program(config: &Config) -> Result<Arc<Program>> {
    let program = match &config.program.file {
        Some(path) => Program::load_from(path)?,
        None => get_default_program()?.clone(),
    };

    let errors = program.validate();
    if !errors.is_empty() {
        eprintln!("Program validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::DataUnavailable("invalid program asset".into()));
    }

    Ok(Arc::new(program))
}

fn cmd_status(data_dir: &Path, config: &Config) -> Result<()> {
    let program = load_program(config)?;
    let ledger = ProgressLedger::load(&ledger_path(data_dir))?;

    println!("Completed workouts: {}", ledger.completed_workouts.len());

    // The untouched ledger means the very first workout is next.
    let (week, day) = if ledger.last_completed_week == 0 {
        (1, 1)
    } else {
        ledger.next_workout()
    };

    if program.resolved_day(week, day).is_some() {
        println!("Next workout: week {}, day {}", week, day);
    } else {
        println!("Program complete. Congratulations!");
    }

    Ok(())
}

fn cmd_plan(data_dir: &Path, config: &Config) -> Result<()> {
    let program = load_program(config)?;
    let ledger = ProgressLedger::load(&ledger_path(data_dir))?;

    for week in program.weeks() {
        println!("Week {}", week.week);
        for day in 1..=week.days.len() as u32 {
            let durations = program.resolved_day(week.week, day).unwrap_or(&[]);
            let segments = compile_segments(durations);
            let marker = if ledger.is_completed(week.week, day) {
                "x"
            } else if ledger.is_unlocked(week.week, day) {
                ">"
            } else {
                " "
            };
            println!(
                "  [{}] Day {}: {} segments, {}",
                marker,
                day,
                segments.len(),
                feedback::format_mmss(total_seconds(&segments) as u32)
            );
        }
    }

    Ok(())
}

fn cmd_reset(data_dir: &Path, yes: bool) -> Result<()> {
    if !yes {
        eprintln!("This erases all completion history. Pass --yes to confirm.");
        return Err(Error::Other("reset not confirmed".into()));
    }

    let mut ledger = ProgressLedger::load(&ledger_path(data_dir))?;
    ledger.reset();
    ledger.save(&ledger_path(data_dir))?;
    println!("Progress cleared.");
    Ok(())
}

fn cmd_history(data_dir: &Path, export: Option<PathBuf>) -> Result<()> {
    let journal = journal_path(data_dir);

    if let Some(csv_path) = export {
        let count = journal_to_csv(&journal, &csv_path)?;
        println!("Exported {} workouts to {}", count, csv_path.display());
        return Ok(());
    }

    let records = read_records(&journal)?;
    if records.is_empty() {
        println!("No workouts recorded yet.");
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  week {} day {}  {} of {} planned",
            record.finished_at.format("%Y-%m-%d %H:%M"),
            record.week,
            record.day,
            feedback::format_mmss(record.elapsed_seconds as u32),
            feedback::format_mmss(record.planned_seconds as u32),
        );
    }

    Ok(())
}

async fn cmd_run(
    data_dir: &Path,
    config: &Config,
    week: u32,
    day: u32,
    force: bool,
) -> Result<()> {
    let program = load_program(config)?;
    std::fs::create_dir_all(data_dir)?;

    let ledger = ProgressLedger::load(&ledger_path(data_dir))?;
    if !ledger.is_unlocked(week, day) && !force {
        eprintln!(
            "Week {} day {} is still locked. Finish the earlier workouts first, or pass --force.",
            week, day
        );
        return Err(Error::Other(format!("workout {}-{} is locked", week, day)));
    }

    let engine = WorkoutEngine::new(program, ledger_path(data_dir), config.engine_config());
    let mut events = engine.subscribe_events();
    let mut states = engine.subscribe_state();

    let started_at = Utc::now();
    engine.start(week, day).await?;
    println!("Controls: [p]ause  [r]esume  [s]kip  [f]inish  [q]uit");

    let mut keys = spawn_stdin_reader();
    let mut last_active: Option<WorkoutState> = None;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(pattern) = haptic_for_event(&event) {
                        ring_bell(pattern.pulses());
                    }
                    if let Some(message) = event_message(&event) {
                        println!("\r{:<70}", message);
                    }
                    match event {
                        WorkoutEvent::WorkoutFinished { genuine, .. } => {
                            if genuine {
                                record_journal_entry(data_dir, last_active.as_ref(), started_at)?;
                            }
                            break;
                        }
                        WorkoutEvent::WorkoutStopped => break,
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event stream lagged by {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if state.phase.is_active() {
                    print!("\r{:<70}", status_line(&state));
                    let _ = std::io::stdout().flush();
                    last_active = Some(state);
                }
            },
            Some(key) = keys.recv() => {
                match key.as_str() {
                    "p" => engine.pause().await,
                    "r" => engine.resume().await,
                    "s" => engine.skip().await,
                    "f" => engine.finish().await,
                    "q" => engine.stop().await,
                    _ => println!("Controls: [p]ause  [r]esume  [s]kip  [f]inish  [q]uit"),
                }
            }
        }
    }

    // Let the completion write land before the process exits.
    engine.wait_for_persistence().await;
    Ok(())
}

/// Keyboard commands arrive over a channel fed by a blocking stdin reader.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line.trim().to_lowercase()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Terminal stand-in for the haptic collaborator.
fn ring_bell(pulses: u32) {
    let mut out = std::io::stdout();
    for _ in 0..pulses {
        let _ = out.write_all(b"\x07");
    }
    let _ = out.flush();
}

fn record_journal_entry(
    data_dir: &Path,
    last_state: Option<&WorkoutState>,
    started_at: chrono::DateTime<Utc>,
) -> Result<()> {
    let Some(state) = last_state else {
        tracing::warn!("No workout state observed; skipping journal entry");
        return Ok(());
    };

    let mut journal = JsonlJournal::new(journal_path(data_dir));
    journal.append(&WorkoutRecord {
        id: state.session_id.unwrap_or_else(Uuid::new_v4),
        week: state.week,
        day: state.day,
        started_at,
        finished_at: Utc::now(),
        planned_seconds: state.total_seconds_planned,
        elapsed_seconds: state.elapsed_seconds_total,
    })
}
