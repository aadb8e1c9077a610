mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ticketwatch::config::{GlobalArgs, Settings, DB_FILE_NAME};
use ticketwatch::db::Database;

#[derive(Parser)]
#[command(name = "ticketwatch")]
#[command(about = "Support desk client with ticket change notifications")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Log output format (logs go to stderr, level from TICKETWATCH_LOG)
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        /// Account email
        email: String,
        /// Account password
        #[arg(long, env = "TICKETWATCH_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log out and forget the stored token
    Logout,

    /// List visible tickets with per-status counters
    List {
        /// Filter by status (abierto, en_proceso, resuelto, all)
        #[arg(short, long, default_value = "all")]
        status: String,
    },

    /// Show ticket details
    Show {
        /// Ticket ID
        id: i64,
    },

    /// Open a new ticket (not available to superusers)
    Create {
        /// Short summary
        #[arg(short, long)]
        subject: String,
        /// Full description of the problem
        #[arg(short, long)]
        content: String,
        /// Department id or name
        #[arg(short, long)]
        department: String,
        /// Reason id or name within the department
        #[arg(short, long)]
        reason: Option<String>,
        /// Priority code (baja, media, alta, urgente)
        #[arg(short, long, default_value = "media")]
        priority: String,
    },

    /// Change a ticket's status or priority (superusers only)
    Set {
        /// Ticket ID
        id: i64,
        /// New status code
        #[arg(short, long)]
        status: Option<String>,
        /// New priority code
        #[arg(short, long)]
        priority: Option<String>,
    },

    /// Watch tickets for changes until logout or session expiry
    Watch {
        /// Keep notification state in memory only
        #[arg(long)]
        ephemeral: bool,
        /// Do not ring the terminal bell
        #[arg(short, long)]
        quiet: bool,
    },

    /// Inspect or clear the notification dedup state
    State {
        #[command(subcommand)]
        action: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// Print the tracked ticket snapshots
    Show,
    /// Forget all tracked snapshots
    Reset,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_env("TICKETWATCH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn get_db(settings: &Settings) -> Result<Database> {
    let data_dir = settings.find_data_dir()?;
    let db_path = data_dir.join(DB_FILE_NAME);
    Database::open(&db_path).context("Failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    let settings = Settings::from_args(&cli.global);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(cli.command, settings))
}

async fn run(command: Commands, settings: Settings) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            commands::login::run(&settings, &email, &password).await
        }

        Commands::Logout => {
            let db = get_db(&settings)?;
            commands::logout::run(&db, &settings).await
        }

        Commands::List { status } => {
            let db = get_db(&settings)?;
            commands::list::run(&db, &settings, &status).await
        }

        Commands::Show { id } => {
            let db = get_db(&settings)?;
            commands::show::run(&db, &settings, id).await
        }

        Commands::Create {
            subject,
            content,
            department,
            reason,
            priority,
        } => {
            let db = get_db(&settings)?;
            let args = commands::create::NewTicketArgs {
                subject: &subject,
                content: &content,
                department: &department,
                reason: reason.as_deref(),
                priority: &priority,
            };
            commands::create::run(&db, &settings, args).await
        }

        Commands::Set {
            id,
            status,
            priority,
        } => {
            let db = get_db(&settings)?;
            commands::set::run(
                &db,
                &settings,
                id,
                status.as_deref(),
                priority.as_deref(),
            )
            .await
        }

        Commands::Watch { ephemeral, quiet } => {
            let db = Arc::new(get_db(&settings)?);
            let options = commands::watch::WatchOptions { ephemeral, quiet };
            commands::watch::run(db, &settings, options).await
        }

        Commands::State { action } => {
            let db = get_db(&settings)?;
            match action {
                StateCommands::Show => commands::state::show(&db),
                StateCommands::Reset => commands::state::reset(&db),
            }
        }
    }
}
