//! pgmig: PostgreSQL migrations
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! pgmig up
//!
//! # Roll back the last two
//! pgmig down 2
//!
//! # New empty migration
//! pgmig create add_users
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use pgmig::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pgmig")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PostgreSQL migrations", long_about = None)]
#[command(after_help = "EXAMPLES:
    pgmig up
    pgmig create add_users
    pgmig down 2
    pgmig status --format json")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Migrations folder (default: ./migrations)
    #[arg(short, long, global = true)]
    migrations_path: Option<PathBuf>,

    /// .env file path (default: ./.env)
    #[arg(short, long, global = true)]
    env_path: Option<PathBuf>,

    /// Connection string (overrides the fields below)
    #[arg(long, global = true)]
    uri: Option<String>,

    /// Database host
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Database port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Database name
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Database user
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Database password
    #[arg(short = 'w', long, global = true)]
    password: Option<String>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending migrations
    Up,
    /// Roll back the most recent migrations
    Down {
        /// How many migrations to roll back
        #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        steps: u32,
    },
    /// Show migration status
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Create a new migration file
    Create {
        /// Migration name; words are joined with underscores
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl From<OutputFormat> for Format {
    fn from(val: OutputFormat) -> Self {
        match val {
            OutputFormat::Table => Format::Table,
            OutputFormat::Json => Format::Json,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            migrations_path: self.migrations_path.clone(),
            env_path: self.env_path.clone(),
            uri: self.uri.clone(),
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("pgmig=debug")
    } else {
        EnvFilter::try_from_env("PGMIG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.overrides())?;

    if cli.verbose {
        println!(
            "{} {}",
            "Migrations:".dimmed(),
            config.migrations_dir.display()
        );
    }

    if let Commands::Create { name } = &cli.command {
        let path = create_unit(&config.migrations_dir, &name.join(" "))?;
        println!("{} {}", "✓ Created:".green(), path.display());
        return Ok(());
    }

    config.db.validate()?;
    if cli.verbose {
        let db = &config.db;
        println!(
            "{} {}@{}:{}/{}",
            "Connecting to:".dimmed(),
            db.user,
            db.host,
            db.port,
            db.database
        );
    }

    let mut session = Session::connect(&config.db.url()?).await?;
    let result = dispatch(&mut session, &config, &cli.command).await;
    let closed = session.close().await;

    result?;
    closed?;
    Ok(())
}

async fn dispatch(session: &mut Session, config: &Config, command: &Commands) -> MigrateResult<()> {
    let dir = config.migrations_dir.as_path();

    match command {
        Commands::Up => {
            engine::up(session, dir, &mut ConsoleReport).await?;
        }
        Commands::Down { steps } => {
            engine::down(session, dir, *steps as usize, &mut ConsoleReport).await?;
        }
        Commands::Status { format } => {
            let report = engine::status(session, dir).await?;
            println!("{}", render_status(&report, (*format).into()));
        }
        Commands::Create { .. } => unreachable!(), // Handled before connecting
    }

    Ok(())
}
