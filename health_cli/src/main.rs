use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use health_core::format::format_number;
use health_core::timeline::bucket_field;
use health_core::*;
use std::path::{Path, PathBuf};

/// Width of the longest chart bar, in characters
const BAR_WIDTH: f64 = 30.0;

#[derive(Parser)]
#[command(name = "hlog")]
#[command(about = "Daily health metric log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Act as this user (overrides config and HLOG_USER)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Read configuration from this file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the log for a day (default)
    Show {
        /// Day to show (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Set a metric for a day, e.g. `hlog log steps "1,234"`
    Log {
        /// steps, calories, protein, workout_minutes or weight
        field: MetricField,

        /// Value as typed; separators and unit suffix are ignored, 0 clears
        value: String,

        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Clear a metric for a day
    Clear {
        field: MetricField,

        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Chart a metric over the last week, month or year
    Trends {
        #[arg(long, default_value = "steps")]
        field: MetricField,

        /// week (7 days), month (4 weeks) or year (12 months)
        #[arg(long, default_value = "week")]
        range: Granularity,

        /// Last day of the chart (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Show or change daily targets
    Targets {
        #[command(subcommand)]
        action: Option<TargetsAction>,
    },

    /// Export all entries to CSV
    Export {
        #[arg(long)]
        output: PathBuf,
    },

    /// Rewrite the entries log with one line per day
    Compact,
}

#[derive(Subcommand)]
enum TargetsAction {
    /// Print the current targets
    Show,

    /// Change one or more targets
    Set {
        #[arg(long)]
        steps: Option<u32>,
        #[arg(long)]
        calories: Option<u32>,
        #[arg(long)]
        protein: Option<u32>,
        #[arg(long)]
        workouts: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    health_core::logging::init(&config.logging);

    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }

    let identity = match cli.user {
        Some(id) => StaticIdentity::signed_in(UserId::new(id)?),
        None => StaticIdentity(config.current_user()),
    };
    let Some(user) = identity.current_user() else {
        eprintln!("Not signed in. Set [user] id in the config file, HLOG_USER, or pass --user.");
        return Err(Error::Unauthenticated);
    };

    let mut store = JsonlStore::new(config.entries_path());
    let today = Local::now().date_naive();
    tracing::debug!("Using {:?} as {}", store.path(), user);

    match cli.command {
        Some(Commands::Show { date }) => {
            cmd_show(&store, &identity, &config, date.unwrap_or(today))
        }
        Some(Commands::Log { field, value, date }) => cmd_log(
            &mut store,
            &identity,
            field,
            &value,
            date.unwrap_or(today),
        ),
        Some(Commands::Clear { field, date }) => {
            cmd_log(&mut store, &identity, field, "", date.unwrap_or(today))
        }
        Some(Commands::Trends {
            field,
            range,
            today: end,
        }) => cmd_trends(&store, &user, &config, field, range, end.unwrap_or(today)),
        Some(Commands::Targets { action }) => cmd_targets(&config, &user, action),
        Some(Commands::Export { output }) => cmd_export(&store, &user, &output),
        Some(Commands::Compact) => {
            let kept = store.compact()?;
            println!("✓ Compacted log to {} records", kept);
            Ok(())
        }
        None => cmd_show(&store, &identity, &config, today),
    }
}

fn cmd_show(
    store: &JsonlStore,
    identity: &StaticIdentity,
    config: &Config,
    date: NaiveDate,
) -> Result<()> {
    let session = DaySession::load(identity, store, date)?;
    let user = &session.key().user;
    let targets = TargetStore::load(&config.targets_path())?.targets_for(user);
    let previous = previous_day_entry(store, user, date)?;

    println!("\n  {} ({})", date.format("%A, %B %-d %Y"), user);
    println!("─────────────────────────────────────────");

    for field in MetricField::ALL {
        let shown = session.display(field);
        let shown = if shown.is_empty() { "-".to_string() } else { shown };

        let mut line = format!("  {:<9} {:>16}", field.label(), shown);
        if let Some(goal) = targets.goal_for(field) {
            line.push_str(&format!("  / {}", format_number(field, goal)));
            if session.committed(field).is_some_and(|v| v >= goal) {
                line.push_str("  ✓");
            }
        }
        if field == MetricField::Weight {
            if let Some(prev) = previous.as_ref().and_then(|p| field.get(&p.entry)) {
                line.push_str(&format!(
                    "  (prev {})",
                    format_for_display(field, prev)
                ));
            }
        }
        println!("{}", line);
    }

    println!();
    Ok(())
}

fn cmd_log(
    store: &mut JsonlStore,
    identity: &StaticIdentity,
    field: MetricField,
    value: &str,
    date: NaiveDate,
) -> Result<()> {
    let mut session = DaySession::load(identity, &*store, date)?;

    session.focus(field);
    session.input(field, value);

    match session.commit_with(store, field) {
        Ok(Some(_)) => {
            let shown = session.display(field);
            if shown.is_empty() {
                println!("✓ Cleared {} for {}", field.label(), date);
            } else {
                println!("✓ Saved {} for {}: {}", field.label(), date, shown);
            }
            Ok(())
        }
        Ok(None) => {
            println!("No change to {} for {}", field.label(), date);
            Ok(())
        }
        Err(e) => {
            if let Some(msg) = session.error_message(field) {
                eprintln!("✗ {}", msg);
            }
            Err(e)
        }
    }
}

fn cmd_trends(
    store: &JsonlStore,
    user: &UserId,
    config: &Config,
    field: MetricField,
    range: Granularity,
    today: NaiveDate,
) -> Result<()> {
    let ranges = range.ranges(today);
    let from = ranges.first().map_or(today, |(start, _)| *start);
    let entries = entries_between(store, user, from, today)?;
    let targets = TargetStore::load(&config.targets_path())?.targets_for(user);
    let goal = targets.goal_for(field);

    let points = bucket_field(&entries, range, field, today);
    let scale = scale_max(&points, goal);

    println!("\n  {}: last {}", field.label(), range);
    println!("─────────────────────────────────────────");
    for point in &points {
        match point.value {
            Some(value) => {
                let width = ((value / scale) * BAR_WIDTH).round() as usize;
                println!(
                    "  {:>5} {:<30} {}",
                    point.label,
                    "█".repeat(width.max(1)),
                    format_for_display(field, value)
                );
            }
            None => println!("  {:>5} {:<30} -", point.label, ""),
        }
    }
    if let Some(goal) = goal {
        println!("  goal: {}", format_for_display(field, goal));
    }
    if points.iter().all(|p| p.value.is_none()) {
        println!("  No data for this range yet.");
    }
    println!();

    Ok(())
}

fn cmd_targets(config: &Config, user: &UserId, action: Option<TargetsAction>) -> Result<()> {
    let path = config.targets_path();

    let targets = match action {
        Some(TargetsAction::Set {
            steps,
            calories,
            protein,
            workouts,
        }) => {
            let updated = TargetStore::update(&path, user, |t| {
                if let Some(v) = steps {
                    t.steps = v;
                }
                if let Some(v) = calories {
                    t.calories = v;
                }
                if let Some(v) = protein {
                    t.protein = v;
                }
                if let Some(v) = workouts {
                    t.workouts_per_day = v;
                }
            })?;
            println!("✓ Targets updated");
            updated
        }
        Some(TargetsAction::Show) | None => TargetStore::load(&path)?.targets_for(user),
    };

    println!(
        "  Steps:     {}",
        format_for_display(MetricField::Steps, f64::from(targets.steps))
    );
    println!(
        "  Calories:  {}",
        format_for_display(MetricField::Calories, f64::from(targets.calories))
    );
    println!(
        "  Protein:   {}",
        format_for_display(MetricField::Protein, f64::from(targets.protein))
    );
    println!("  Workouts:  {} per day", targets.workouts_per_day);
    Ok(())
}

fn cmd_export(store: &JsonlStore, user: &UserId, output: &Path) -> Result<()> {
    let entries: Vec<MetricEntry> = store
        .query(&EntryQuery::for_user(user.clone()))?
        .into_iter()
        .map(|r| r.entry)
        .collect();

    let count = export_csv(&entries, output)?;
    println!("✓ Exported {} days to {}", count, output.display());
    Ok(())
}
