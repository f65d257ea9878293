//! liftlog CLI
//!
//! Command-line front end for a liftlog database.
//!
//! # Commands
//!
//! - `group` / `exercise` - Manage the catalog
//! - `today` - Pick today's muscle group, log exercises, finish the session
//! - `history`, `prs`, `trend` - Read back what was logged
//! - `export` / `import` / `clear` - Full-replace backups
//! - `settings` - Show or change settings
//! - `migrate status` - Show applied schema versions
//! - `compact` - Rewrite the operation log as a snapshot

mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Offline strength-training log.
#[derive(Parser)]
#[command(name = "liftlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Treat this day (YYYY-MM-DD) as today
    #[arg(global = true, long)]
    date: Option<NaiveDate>,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage muscle groups
    #[command(subcommand)]
    Group(GroupCommand),

    /// Manage exercises
    #[command(subcommand)]
    Exercise(ExerciseCommand),

    /// Work with today's session
    #[command(subcommand)]
    Today(TodayCommand),

    /// Show past sessions or sets
    #[command(subcommand)]
    History(HistoryCommand),

    /// Show personal records
    Prs {
        /// Exercise id or name (all exercises if omitted)
        exercise: Option<String>,

        /// 1RM formula (epley, brzycki, lombardi)
        #[arg(short, long)]
        estimator: Option<String>,
    },

    /// Show the estimated 1RM trend of an exercise
    Trend {
        /// Exercise id or name
        exercise: String,

        /// One point per completion instead of per set
        #[arg(long)]
        per_completion: bool,

        /// 1RM formula (epley, brzycki, lombardi)
        #[arg(short, long)]
        estimator: Option<String>,
    },

    /// Export every record as a backup document
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all data with a backup document
    Import {
        /// Backup file
        input: PathBuf,

        /// Required: importing discards all current data
        #[arg(long)]
        force: bool,
    },

    /// Delete all records, keeping the schema
    Clear {
        /// Required: this cannot be undone
        #[arg(long)]
        force: bool,
    },

    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Schema migration information
    #[command(subcommand)]
    Migrate(MigrateCommand),

    /// Rewrite the operation log as a single snapshot
    Compact,

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum GroupCommand {
    /// Add a muscle group
    Add {
        /// Stable identifier
        identifier: String,

        /// Display name (defaults to the identifier)
        #[arg(short, long)]
        name: Option<String>,

        /// Display color
        #[arg(long)]
        color: Option<String>,

        /// Display icon
        #[arg(long)]
        icon: Option<String>,

        /// Position in lists
        #[arg(short, long, default_value = "0")]
        sort_order: i64,
    },

    /// List muscle groups
    List {
        /// Include inactive groups
        #[arg(short, long)]
        all: bool,
    },

    /// Hide or show a muscle group
    SetActive {
        /// Identifier
        identifier: String,

        /// New state
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Remove an unused muscle group
    Remove {
        /// Identifier
        identifier: String,
    },
}

#[derive(Subcommand)]
enum ExerciseCommand {
    /// Add an exercise
    Add {
        /// Exercise name
        name: String,

        /// Muscle group identifier
        #[arg(short, long)]
        group: String,

        /// Alternative names
        #[arg(short, long)]
        alias: Vec<String>,

        /// Preferred unit (kg, lb)
        #[arg(short, long)]
        unit: Option<String>,

        /// Demonstration link
        #[arg(long)]
        demo_url: Option<String>,
    },

    /// List exercises
    List {
        /// Only this muscle group
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Rename an exercise
    Rename {
        /// Exercise id or name
        exercise: String,

        /// New name
        name: String,
    },

    /// Remove an exercise; logged history stays
    Remove {
        /// Exercise id or name
        exercise: String,
    },
}

#[derive(Subcommand)]
enum TodayCommand {
    /// Start today's session or switch its muscle group
    Select {
        /// Muscle group identifier
        group: String,
    },

    /// Show today's session and completions
    Show,

    /// Log the sets of an exercise
    Complete {
        /// Exercise id or name
        exercise: String,

        /// A set as WEIGHTxREPS or WEIGHTxREPS@RPE, e.g. 135x5@8
        #[arg(short, long = "set", required = true)]
        sets: Vec<String>,
    },

    /// Mark today's session completed
    Finish,
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// Sessions in a date range, newest first
    Sessions {
        /// First day (default: 30 days ago)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day (default: today)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// List every session, including empty past ones
        #[arg(short, long)]
        all: bool,
    },

    /// Recent sets of an exercise, newest first
    Exercise {
        /// Exercise id or name
        exercise: String,

        /// Number of sets
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Show settings
    Show,

    /// Change settings
    Set {
        /// Weight unit (kg, lb)
        #[arg(long)]
        unit: Option<String>,

        /// Theme (light, dark, system)
        #[arg(long)]
        theme: Option<String>,

        /// Enable backup reminders
        #[arg(long)]
        backup_reminder: Option<bool>,

        /// Days between backup reminders
        #[arg(long)]
        backup_frequency_days: Option<u32>,
    },
}

#[derive(Subcommand)]
enum MigrateCommand {
    /// Show applied and pending schema versions
    Status,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("liftlog CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("liftlog core v{}", liftlog_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or("Database path required (--path)")?;
    let db = commands::open(&path, cli.date)?;
    let json = commands::wants_json(&cli.format)?;

    match cli.command {
        Commands::Group(cmd) => match cmd {
            GroupCommand::Add {
                identifier,
                name,
                color,
                icon,
                sort_order,
            } => commands::group::add(&db, identifier, name, color, icon, sort_order)?,
            GroupCommand::List { all } => commands::group::list(&db, all, json)?,
            GroupCommand::SetActive { identifier, active } => {
                commands::group::set_active(&db, &identifier, active)?;
            }
            GroupCommand::Remove { identifier } => commands::group::remove(&db, &identifier)?,
        },
        Commands::Exercise(cmd) => match cmd {
            ExerciseCommand::Add {
                name,
                group,
                alias,
                unit,
                demo_url,
            } => commands::exercise::add(&db, name, group, alias, unit, demo_url)?,
            ExerciseCommand::List { group } => {
                commands::exercise::list(&db, group.as_deref(), json)?;
            }
            ExerciseCommand::Rename { exercise, name } => {
                commands::exercise::rename(&db, &exercise, name)?;
            }
            ExerciseCommand::Remove { exercise } => commands::exercise::remove(&db, &exercise)?,
        },
        Commands::Today(cmd) => match cmd {
            TodayCommand::Select { group } => commands::today::select(&db, &group)?,
            TodayCommand::Show => commands::today::show(&db, json)?,
            TodayCommand::Complete { exercise, sets } => {
                commands::today::complete(&db, &exercise, &sets)?;
            }
            TodayCommand::Finish => commands::today::finish(&db)?,
        },
        Commands::History(cmd) => match cmd {
            HistoryCommand::Sessions { from, to, all } => {
                commands::history::sessions(&db, from, to, all, json)?;
            }
            HistoryCommand::Exercise { exercise, limit } => {
                commands::history::exercise(&db, &exercise, limit, json)?;
            }
        },
        Commands::Prs {
            exercise,
            estimator,
        } => commands::history::prs(&db, exercise.as_deref(), estimator.as_deref(), json)?,
        Commands::Trend {
            exercise,
            per_completion,
            estimator,
        } => commands::history::trend(&db, &exercise, per_completion, estimator.as_deref(), json)?,
        Commands::Export { output } => commands::backup::export(&db, output.as_deref())?,
        Commands::Import { input, force } => commands::backup::import(&db, &input, force)?,
        Commands::Clear { force } => commands::backup::clear(&db, force)?,
        Commands::Settings(cmd) => match cmd {
            SettingsCommand::Show => commands::settings::show(&db, json)?,
            SettingsCommand::Set {
                unit,
                theme,
                backup_reminder,
                backup_frequency_days,
            } => commands::settings::set(
                &db,
                unit.as_deref(),
                theme.as_deref(),
                backup_reminder,
                backup_frequency_days,
            )?,
        },
        Commands::Migrate(MigrateCommand::Status) => commands::migrate::status(&db, json)?,
        Commands::Compact => commands::compact::run(&db)?,
        Commands::Version => {}
    }

    db.close()?;
    Ok(())
}
