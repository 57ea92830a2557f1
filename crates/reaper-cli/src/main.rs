mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use reaper_core::app::{DEFAULT_CONCURRENCY, ReaperBuilder, RunReport, plan};
use reaper_core::config::ReaperConfig;
use reaper_core::domain::{Action, ItemId, ItemKind, ItemState};
use reaper_core::impls::{InMemoryNotifier, JournalNotifier, JsonFileItemStore};
use reaper_core::ports::{FixedClock, Notifier};

#[derive(Parser)]
#[command(
    name = "stale-reaper",
    about = "Mark inactive issues and pull requests stale, then close them",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one batch: evaluate every item, send effects, save new states
    Run {
        /// Config file (flat YAML or scheduled workflow)
        #[arg(long, env = "STALE_REAPER_CONFIG")]
        config: PathBuf,

        /// Items file (JSON array), rewritten with the new states
        #[arg(long)]
        items: PathBuf,

        /// Effects journal (JSON lines), appended to
        #[arg(long, default_value = "stale-reaper.journal.jsonl")]
        journal: PathBuf,

        /// Evaluate as of this RFC 3339 instant instead of now
        #[arg(long)]
        now: Option<String>,

        /// Report what would happen without sending or saving anything
        #[arg(long)]
        dry_run: bool,

        /// Items processed at the same time
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Abort unfinished items after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Print the run report as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },

    /// Load and validate a config file
    Check {
        #[arg(long, env = "STALE_REAPER_CONFIG")]
        config: PathBuf,

        #[arg(long, short = 'j')]
        json: bool,
    },

    /// Show the action each item would get, without running anything
    Evaluate {
        #[arg(long, env = "STALE_REAPER_CONFIG")]
        config: PathBuf,

        #[arg(long)]
        items: PathBuf,

        #[arg(long)]
        now: Option<String>,

        #[arg(long, short = 'j')]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Run {
                config,
                items,
                journal,
                now,
                dry_run,
                concurrency,
                deadline_secs,
                json,
            } => {
                run(RunArgs {
                    config,
                    items,
                    journal,
                    now,
                    dry_run,
                    concurrency,
                    deadline_secs,
                    json,
                })
                .await
            }
            Commands::Check { config, json } => check(&config, json),
            Commands::Evaluate {
                config,
                items,
                now,
                json,
            } => evaluate(&config, &items, now.as_deref(), json).await,
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

struct RunArgs {
    config: PathBuf,
    items: PathBuf,
    journal: PathBuf,
    now: Option<String>,
    dry_run: bool,
    concurrency: usize,
    deadline_secs: Option<u64>,
    json: bool,
}

fn load_config(path: &Path) -> Result<ReaperConfig> {
    ReaperConfig::load(path).with_context(|| format!("invalid config {}", path.display()))
}

fn parse_now(raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .with_context(|| format!("--now is not an RFC 3339 timestamp: {s}"))
    })
    .transpose()
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if args.dry_run {
        config.debug_only = true;
    }
    tracing::info!(
        config = %args.config.display(),
        items = %args.items.display(),
        dry_run = config.debug_only,
        "starting run"
    );
    let now = parse_now(args.now.as_deref())?;

    let store = JsonFileItemStore::open(&args.items)
        .with_context(|| format!("failed to load items from {}", args.items.display()))?;
    let notifier = notifier_for(&config, &args.journal)?;

    let mut builder = ReaperBuilder::new(config)
        .store(Arc::new(store))
        .notifier(notifier)
        .concurrency(args.concurrency);
    if let Some(now) = now {
        builder = builder.clock(FixedClock::new(now));
    }
    if let Some(secs) = args.deadline_secs {
        builder = builder.deadline(Duration::from_secs(secs));
    }
    let reaper = builder.build()?;

    let report = reaper.run_once().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// The effects journal, or an in-memory notifier for dry runs so that
/// nothing is created on disk.
fn notifier_for(config: &ReaperConfig, journal: &Path) -> Result<Arc<dyn Notifier>> {
    if config.debug_only {
        return Ok(Arc::new(InMemoryNotifier::new()));
    }
    let notifier = JournalNotifier::open(journal)
        .with_context(|| format!("failed to open journal {}", journal.display()))?;
    Ok(Arc::new(notifier))
}

fn print_report(report: &RunReport) {
    let c = &report.counts;
    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!("{}{mode}", report.run_id);
    println!(
        "  scanned {}  marked stale {}  closed {}  unchanged {}",
        c.scanned, c.marked_stale, c.closed, c.noop
    );
    println!(
        "  skipped {}  deferred {}  failed {}  timed out {}",
        c.skipped, c.deferred, c.failed, c.timed_out
    );
    for t in &report.transitions {
        println!("  {} {} {:?} -> {:?}", t.item_id, t.kind, t.from, t.to);
    }
    for f in &report.failures {
        println!("  FAILED {} {}: {}", f.item_id, f.action, f.error);
    }
}

fn check(path: &Path, json: bool) -> Result<()> {
    let config = load_config(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("{}: ok", path.display());
    println!(
        "  stale after {} days, close after {} more days",
        config.days_before_stale, config.days_before_close
    );
    println!(
        "  schedule: {}",
        config.schedule.as_deref().unwrap_or("(none)")
    );
    println!("  operations per run: {}", config.operations_per_run);
    if config.debug_only {
        println!("  debug-only: effects are not sent");
    }
    for kind in ItemKind::ALL {
        if !config.is_enabled(kind) {
            println!("  {kind}: disabled");
            continue;
        }
        let policy = config.policy(kind);
        let watched: Vec<&str> = policy.watched_labels.iter().map(String::as_str).collect();
        println!(
            "  {kind}: watching [{}], stale label {:?}",
            watched.join(", "),
            policy.stale_label
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct EvaluatedItem {
    id: ItemId,
    kind: ItemKind,
    state: ItemState,
    action: Option<Action>,
    note: Option<&'static str>,
}

async fn evaluate(
    config_path: &Path,
    items_path: &Path,
    now: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let now = parse_now(now)?.unwrap_or_else(Utc::now);
    let store = JsonFileItemStore::open(items_path)
        .with_context(|| format!("failed to load items from {}", items_path.display()))?;
    let items = store.snapshot().await;

    let plan = plan(items.clone(), now, &config);
    let scheduled = |id: &ItemId| {
        plan.scheduled
            .iter()
            .chain(plan.deferred.iter())
            .find(|p| &p.item.id == id)
            .map(|p| p.action)
    };

    let rows: Vec<EvaluatedItem> = items
        .iter()
        .map(|item| {
            let skipped = plan.skipped.contains(&item.id);
            let deferred = plan.deferred.iter().any(|p| p.item.id == item.id);
            EvaluatedItem {
                id: item.id.clone(),
                kind: item.kind,
                state: item.state,
                action: if skipped {
                    None
                } else {
                    Some(scheduled(&item.id).unwrap_or(Action::NoOp))
                },
                note: if skipped {
                    item.missing_timestamp()
                } else if deferred {
                    Some("over operations-per-run")
                } else {
                    None
                },
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for row in &rows {
        let action = row
            .action
            .map(|a| a.to_string())
            .unwrap_or_else(|| "skip".to_string());
        match row.note {
            Some(note) => println!("{} {} {:?} {action} ({note})", row.id, row.kind, row.state),
            None => println!("{} {} {:?} {action}", row.id, row.kind, row.state),
        }
    }
    Ok(())
}
