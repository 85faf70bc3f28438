use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use scheduler_cli::context::Context;
use scheduler_cli::{attempt, mastery, schedule, session};

/// Scheduler CLI - local inspection and scripting against the adaptive
/// practice scheduler's store, without requiring the HTTP server.
#[derive(Parser)]
#[command(name = "scheduler")]
#[command(about = "Scheduler CLI tool for local inspection and scripting", long_about = None)]
struct Cli {
    /// Path to the sqlite database (default: data/scheduler.db)
    #[arg(long, default_value = "data/scheduler.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record or list attempts
    Attempt {
        #[command(subcommand)]
        command: AttemptCommands,
    },
    /// Inspect or transition sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Inspect tag mastery and the box-level distribution
    Mastery {
        #[command(subcommand)]
        command: MasteryCommands,
    },
    /// Print today's review schedule
    Schedule {
        /// Maximum number of problems to print
        #[arg(long, default_value_t = 10)]
        n: usize,
    },
}

#[derive(Subcommand)]
enum AttemptCommands {
    /// Record an attempt against a problem
    Add {
        #[arg(long)]
        problem_id: Option<Uuid>,
        #[arg(long)]
        leetcode_id: Option<i64>,
        #[arg(long)]
        success: bool,
        #[arg(long)]
        time_spent: u32,
        #[arg(long, default_value_t = 0)]
        hints_used: u32,
        #[arg(long)]
        comments: Option<String>,
        #[arg(long)]
        session_id: Option<Uuid>,
    },
    /// List attempts against a problem, most recent first
    List {
        problem_id: Uuid,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Fetch a session by id
    Get { id: Uuid },
    /// Resume the most recent compatible in-progress session
    Resume {
        #[arg(long, value_enum)]
        session_type: Option<CliSessionType>,
    },
    /// Get an existing compatible session, or create a new one
    Create {
        #[arg(value_enum)]
        session_type: CliSessionType,
    },
    /// Delete the existing session of this type and create a fresh one
    Refresh {
        #[arg(value_enum)]
        session_type: CliSessionType,
        #[arg(long, default_value_t = false)]
        force_new: bool,
    },
    /// Check whether a session is complete, sealing it if so
    Complete { id: Uuid },
    /// Remove a problem from a session's problem list
    Skip {
        id: Uuid,
        leetcode_id: i64,
    },
}

#[derive(Subcommand)]
enum MasteryCommands {
    /// Per-tag mastery snapshot
    Show,
    /// Problem counts by Leitner box level
    BoxLevels,
}

/// Mirrors `scheduler_core::SessionType` for `clap::ValueEnum` — the core
/// type carries no CLI dependency, so the mapping lives here.
#[derive(Clone, Copy, ValueEnum)]
enum CliSessionType {
    Standard,
    Tracking,
    InterviewLike,
    FullInterview,
}

impl From<CliSessionType> for scheduler_core::SessionType {
    fn from(value: CliSessionType) -> Self {
        match value {
            CliSessionType::Standard => scheduler_core::SessionType::Standard,
            CliSessionType::Tracking => scheduler_core::SessionType::Tracking,
            CliSessionType::InterviewLike => scheduler_core::SessionType::InterviewLike,
            CliSessionType::FullInterview => scheduler_core::SessionType::FullInterview,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).compact().init();

    let cli = Cli::parse();
    let ctx = Context::connect(&cli.db).await?;

    match cli.command {
        Commands::Attempt { command } => match command {
            AttemptCommands::Add {
                problem_id,
                leetcode_id,
                success,
                time_spent,
                hints_used,
                comments,
                session_id,
            } => {
                let data = scheduler_core::NewAttempt {
                    problem_id,
                    leetcode_id,
                    success,
                    time_spent,
                    hints_used,
                    comments,
                };
                attempt::add(&ctx, data, session_id).await?;
            }
            AttemptCommands::List { problem_id } => {
                attempt::list(&ctx, problem_id).await?;
            }
        },
        Commands::Session { command } => match command {
            SessionCommands::Get { id } => session::get(&ctx, id).await?,
            SessionCommands::Resume { session_type } => {
                session::resume(&ctx, session_type.map(Into::into)).await?
            }
            SessionCommands::Create { session_type } => {
                session::create(&ctx, session_type.into()).await?
            }
            SessionCommands::Refresh {
                session_type,
                force_new,
            } => session::refresh(&ctx, session_type.into(), force_new).await?,
            SessionCommands::Complete { id } => session::complete(&ctx, id).await?,
            SessionCommands::Skip { id, leetcode_id } => {
                session::skip(&ctx, id, leetcode_id, None).await?
            }
        },
        Commands::Mastery { command } => match command {
            MasteryCommands::Show => mastery::show(&ctx).await?,
            MasteryCommands::BoxLevels => mastery::box_levels(&ctx).await?,
        },
        Commands::Schedule { n } => schedule::daily(&ctx, n).await?,
    }

    Ok(())
}
