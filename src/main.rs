mod agenda;
mod config;
mod db;
mod engine;
mod error;
mod journal;
mod models;
mod stats;
mod tui;

use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use config::Config;
use db::Database;
use journal::LogForm;
use models::{parse_date, JsonOutput, Projection, SessionRecord, Subject};
use stats::Metrics;

#[derive(Parser)]
#[command(name = "revisor")]
#[command(about = "A tiered review planner that turns practice sessions into a spaced review agenda")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log debug output to stderr
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Record a practice session
    Log {
        /// Subject, e.g. Biologia
        #[arg(long, short)]
        subject: String,

        /// Topic studied
        #[arg(long, short)]
        topic: String,

        /// Number of questions answered
        #[arg(long, short = 'n')]
        total: String,

        /// Number of correct answers
        #[arg(long, short)]
        correct: String,

        /// Day of the session (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Missed question as REF:TYPE, repeatable
        #[arg(long, short)]
        wrong: Vec<String>,
    },

    /// List scheduled reviews
    Agenda {
        /// Only reviews due on this day (YYYY-MM-DD)
        #[arg(long, short)]
        date: Option<String>,

        /// Filter by subject
        #[arg(long, short)]
        subject: Option<String>,

        /// Only reviews due before today
        #[arg(long)]
        overdue: bool,
    },

    /// Show a month of scheduled reviews
    Calendar {
        /// Month to show (YYYY-MM), defaults to the current month
        #[arg(long, short)]
        month: Option<String>,
    },

    /// Show accuracy statistics
    Stats,

    /// List recorded sessions, newest first
    History {
        /// Filter by subject
        #[arg(long, short)]
        subject: Option<String>,

        /// Maximum rows to show
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Pin a topic's next review to a date
    Move {
        /// Override key shown by `agenda`
        key: String,

        /// New review day (YYYY-MM-DD)
        date: String,
    },

    /// Remove a pinned review date
    Unpin {
        /// Override key shown by `agenda`
        key: String,
    },

    /// Delete a recorded session
    Delete {
        /// Session ID
        id: i64,
    },

    /// Import sessions from a JSON array
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Print all sessions and overrides as JSON
    Export,

    /// List known subjects
    Subjects,

    /// Launch interactive terminal UI
    Tui,
}

fn init_tracing(config: &Config, verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("REVISOR_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config, cli.verbose, cli.quiet);

    let db_path = config.db_path();
    tracing::debug!(path = %db_path.display(), "opening database");
    let db = Database::open(&db_path)?;
    db.init()?;

    let today = Local::now().date_naive();

    match cli.command {
        Commands::Init => {
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Log {
            subject,
            topic,
            total,
            correct,
            date,
            wrong,
        } => {
            let wrong_questions = wrong
                .iter()
                .map(|w| journal::parse_wrong_question(w))
                .collect::<Result<Vec<_>, _>>()?;

            let form = LogForm {
                subject,
                topic,
                total,
                correct,
                date: date.unwrap_or_else(|| LogForm::blank(today).date),
                wrong_questions,
                lineage_subject: None,
            };
            let submitted = journal::submit(&db, &form, Utc::now())?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&submitted))?);
            } else {
                println!("Logged session {} for '{}'.", submitted.id, form.topic.trim());
                let projections = load_projections(&db, today)?;
                if let Some(next) = projections
                    .iter()
                    .find(|p| p.override_key == submitted.override_key)
                {
                    println!(
                        "{} (session #{}): next review {} - {}",
                        next.case_label(),
                        next.session_ordinal,
                        next.due_date,
                        next.action
                    );
                }
            }
        }

        Commands::Agenda {
            date,
            subject,
            overdue,
        } => {
            let projections = load_projections(&db, today)?;
            let subject = subject.map(|s| resolve_subject(&s)).transpose()?;

            let selected = select_agenda(&projections, subject.as_deref(), date, overdue, today)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&selected))?);
            } else if selected.is_empty() {
                println!("Nothing scheduled.");
            } else {
                print_agenda(&selected, today);
            }
        }

        Commands::Calendar { month } => {
            let (year, month) = match month {
                Some(raw) => parse_month(&raw).ok_or_else(|| format!("Invalid month '{}'. Use YYYY-MM", raw))?,
                None => (today.year(), today.month()),
            };
            let projections = load_projections(&db, today)?;
            let grid = agenda::month_grid(year, month, &projections)
                .ok_or_else(|| format!("Invalid month {}-{:02}", year, month))?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&grid))?);
            } else {
                print_calendar(year, month, &grid, today);
            }
        }

        Commands::Stats => {
            let sessions = engine::valid_sessions(&db.list_sessions()?);
            let metrics = Metrics::from_sessions(&sessions);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&metrics))?);
            } else {
                println!("=== Study Statistics ===");
                println!("Sessions: {}", metrics.total_sessions);
                println!("Questions: {}", metrics.total_questions);
                println!(
                    "Correct: {} ({:.0}% accuracy)",
                    metrics.total_correct, metrics.accuracy
                );
                println!(
                    "Topics: {} (Case A: {}, Case B: {}, Case C: {})",
                    metrics.lineages(),
                    metrics.cases.a,
                    metrics.cases.b,
                    metrics.cases.c
                );
                if !metrics.by_subject.is_empty() {
                    println!();
                    println!("{:<22} {:>9} {:>8} {:>6}", "SUBJECT", "QUESTIONS", "CORRECT", "ACC");
                    println!("{}", "-".repeat(48));
                    for (subject, totals) in &metrics.by_subject {
                        println!(
                            "{:<22} {:>9} {:>8} {:>5.0}%",
                            truncate(subject, 22),
                            totals.questions,
                            totals.correct,
                            totals.accuracy
                        );
                    }
                }
            }
        }

        Commands::History { subject, limit } => {
            let subject = subject.map(|s| resolve_subject(&s)).transpose()?;
            let sessions = engine::valid_sessions(&db.list_sessions()?);
            let mut entries = agenda::history(&sessions, subject.as_deref());
            entries.truncate(limit.unwrap_or(config.history_limit));

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&entries))?);
            } else if entries.is_empty() {
                println!("No sessions recorded.");
            } else {
                println!(
                    "{:<5} {:<11} {:<20} {:<28} {:>7} {:<7} #",
                    "ID", "DATE", "SUBJECT", "TOPIC", "SCORE", "TIER"
                );
                println!("{}", "-".repeat(86));
                for entry in entries {
                    let s = &entry.session;
                    println!(
                        "{:<5} {:<11} {:<20} {:<28} {:>7} {:<7} {}",
                        s.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
                        s.date.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string()),
                        truncate(&s.subject, 20),
                        truncate(&s.topic, 28),
                        format!("{}/{}", s.correct, s.total),
                        entry.tier.label(),
                        entry.lineage_size
                    );
                }
            }
        }

        Commands::Move { key, date } => {
            let day = parse_date(&date).ok_or_else(|| format!("Invalid date '{}'. Use YYYY-MM-DD", date))?;
            journal::reschedule(&db, &key, day)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Pinned '{}' to {}.", key, day);
            }
        }

        Commands::Unpin { key } => {
            if journal::unpin(&db, &key)? {
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                } else {
                    println!("Removed pinned date for '{}'.", key);
                }
            } else if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::<()>::err("No pinned date for that key"))?
                );
            } else {
                println!("No pinned date for '{}'.", key);
            }
        }

        Commands::Delete { id } => {
            let deleted = match db.get_session(id)? {
                Some(record) if db.delete_session(id)? => Some(record),
                _ => None,
            };
            if let Some(record) = deleted {
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&record))?);
                } else {
                    println!(
                        "Session {} deleted ({} / {}).",
                        id, record.subject, record.topic
                    );
                }
            } else if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::<()>::err("Session not found"))?
                );
            } else {
                println!("Session not found.");
            }
        }

        Commands::Import { file } => {
            let count = import_file(&db, &file)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({ "imported": count })))?
                );
            } else {
                println!("Imported {} sessions from {}.", count, file.display());
            }
        }

        Commands::Export => {
            let export = serde_json::json!({
                "sessions": db.list_sessions()?,
                "overrides": db.list_overrides()?,
            });
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(export))?);
            } else {
                println!("{}", serde_json::to_string_pretty(&export)?);
            }
        }

        Commands::Subjects => {
            if cli.json {
                let labels: Vec<&str> = Subject::ALL.iter().map(|s| s.label()).collect();
                println!("{}", serde_json::to_string(&JsonOutput::ok(labels))?);
            } else {
                for subject in Subject::ALL {
                    let star = if subject.is_discursive() { " ★" } else { "" };
                    println!("{}{}", subject.label(), star);
                }
            }
        }

        Commands::Tui => {
            tui::run(db)?;
        }
    }

    Ok(())
}

fn select_agenda<'a>(
    projections: &'a [Projection],
    subject: Option<&str>,
    date: Option<String>,
    overdue: bool,
    today: NaiveDate,
) -> Result<Vec<&'a Projection>, String> {
    let mut selected = agenda::filter_subject(projections, subject);
    if let Some(raw) = date {
        let day = parse_date(&raw).ok_or_else(|| format!("Invalid date '{}'", raw))?;
        selected = agenda::tasks_on(selected, day);
    }
    if overdue {
        selected = agenda::overdue(selected, today);
    }
    Ok(selected)
}

fn load_projections(db: &Database, today: NaiveDate) -> rusqlite::Result<Vec<Projection>> {
    let sessions = db.list_sessions()?;
    let overrides = db.load_overrides()?;
    Ok(engine::compute_projections(&sessions, &overrides, today))
}

fn import_file(db: &Database, file: &Path) -> Result<usize, error::ImportError> {
    let raw = std::fs::read_to_string(file)?;
    let records = parse_records(&raw)?;
    let count = db.import_records(&records)?;
    tracing::info!(count, file = %file.display(), "sessions imported");
    Ok(count)
}

// Rows that are not objects are skipped so one bad entry does not sink the file.
fn parse_records(raw: &str) -> Result<Vec<SessionRecord>, serde_json::Error> {
    let rows: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    Ok(rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping unreadable import row");
                None
            }
        })
        .collect())
}

fn resolve_subject(raw: &str) -> Result<String, error::FormError> {
    Subject::from_str(raw)
        .map(|s| s.label().to_string())
        .ok_or_else(|| error::FormError::UnknownSubject(raw.to_string()))
}

fn parse_month(raw: &str) -> Option<(i32, u32)> {
    let (year, month) = raw.trim().split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).map(|_| (year, month))
}

fn print_agenda(projections: &[&Projection], today: NaiveDate) {
    println!(
        "{:<11} {:<6} {:<20} {:<26} {:<30} {:>4} {:>3}",
        "DUE", "URG", "SUBJECT", "TOPIC", "CASE", "ACC", "#"
    );
    println!("{}", "-".repeat(106));
    for p in projections {
        let marker = if p.overridden {
            "*"
        } else if p.due_date < today {
            "!"
        } else {
            " "
        };
        println!(
            "{}{:<10} {:<6} {:<20} {:<26} {:<30} {:>3.0}% {:>3}",
            marker,
            p.due_date,
            p.urgency.as_str(),
            truncate(&p.subject, 20),
            truncate(&p.topic, 26),
            p.case_label(),
            p.accuracy,
            p.session_ordinal
        );
        println!("{:<11} {} [key: {}]", "", p.action, p.override_key);
    }
    println!();
    println!("* pinned date   ! overdue");
}

fn print_calendar(year: i32, month: u32, grid: &[agenda::CalendarDay<'_>], today: NaiveDate) {
    println!("{}-{:02}", year, month);
    println!("  Sun   Mon   Tue   Wed   Thu   Fri   Sat");
    for week in grid.chunks(7) {
        let line: String = week
            .iter()
            .map(|cell| match cell.date {
                Some(date) => {
                    let mark = if date == today { '>' } else { ' ' };
                    if cell.tasks.is_empty() {
                        format!("{}{:>2}   ", mark, date.day())
                    } else {
                        format!("{}{:>2}({})", mark, date.day(), cell.tasks.len().min(9))
                    }
                }
                None => "      ".to_string(),
            })
            .collect();
        println!("{}", line.trim_end());
    }

    let busy: Vec<&agenda::CalendarDay<'_>> = grid.iter().filter(|c| !c.tasks.is_empty()).collect();
    if !busy.is_empty() {
        println!();
        for cell in busy {
            if let Some(date) = cell.date {
                for task in &cell.tasks {
                    println!("{}  {} - {} ({})", date, task.subject, task.topic, task.case_label());
                }
            }
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
