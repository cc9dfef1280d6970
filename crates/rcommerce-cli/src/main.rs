use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use rcommerce_core::cache::RedisPool;
use rcommerce_core::jobs::clock::SystemClock;
use rcommerce_core::jobs::dead_letter::DeadLetterSink;
use rcommerce_core::jobs::notify::LoggingNotificationSink;
use rcommerce_core::jobs::queue::{InMemoryDispatchQueue, RedisDispatchQueue};
use rcommerce_core::jobs::store::{InMemoryJobStore, PostgresJobStore};
use rcommerce_core::jobs::{Executor, Scheduler, SchedulerMetrics};
use rcommerce_core::{Config, Result};

mod commands;
mod echo_logic;

use echo_logic::EchoJobLogic;

/// Security checks for CLI operations
mod security {
    use colored::Colorize;
    use std::path::PathBuf;

    /// Check if running as root
    pub fn check_not_root() -> Result<(), String> {
        #[cfg(unix)]
        {
            let uid = unsafe { libc::getuid() };
            if uid == 0 {
                return Err(format!(
                    "\n{}\n{}\n{}",
                    "ERROR: Running as root is not allowed!".red().bold(),
                    "   The rcommerce CLI should not be run as root for security reasons.",
                    "   Please run as a non-privileged user."
                ));
            }
        }
        Ok(())
    }

    /// Check config file permissions
    pub fn check_config_permissions(path: &PathBuf) -> Result<(), String> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = std::fs::metadata(path).map_err(|e| format!("Cannot read config file: {}", e))?;

        let permissions = metadata.permissions();
        let mode = permissions.mode();

        let world_readable = (mode & 0o004) != 0;
        let world_writable = (mode & 0o002) != 0;

        if world_writable {
            return Err(format!(
                "\n{}\n{}\n{}",
                "ERROR: Config file is world-writable!".red().bold(),
                format!("   Path: {}", path.display()),
                "   Run: chmod 600 {}".replace("{}", &path.display().to_string())
            ));
        }

        if world_readable {
            eprintln!(
                "{}",
                format!(
                    "\n{}\n{}\n{}",
                    "WARNING: Config file is world-readable".yellow().bold(),
                    format!("   Path: {}", path.display()),
                    "   Consider running: chmod 600 {}".replace("{}", &path.display().to_string())
                )
            );
        }

        Ok(())
    }
}

#[derive(Parser)]
#[command(name = "rcommerce")]
#[command(about = "Durable, multi-tenant job scheduler")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Set log level")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API, worker pool, and Safety Sync loop
    Serve {
        #[arg(short = 'H', long, help = "Bind address", default_value = "0.0.0.0")]
        host: String,

        #[arg(short = 'P', long, help = "Port number", default_value = "8080")]
        port: u16,

        #[arg(long, help = "Skip automatic database migration on startup")]
        skip_migrate: bool,

        #[arg(long, help = "Use an in-memory store and queue instead of Postgres/Redis")]
        in_memory: bool,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Interactive job management shell
    Shell,

    /// Interactive configuration wizard
    Setup {
        #[arg(short, long, help = "Output path for the generated config file")]
        output: Option<PathBuf>,
    },

    /// Show configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Run job store schema migrations
    Migrate,

    /// Reset database (DANGEROUS - deletes all data)
    Reset {
        #[arg(long, help = "Skip confirmation prompt")]
        force: bool,
    },

    /// Show database status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = if let Some(ref config_path) = cli.config {
        if let Err(e) = security::check_config_permissions(config_path) {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Config::load(config_path.to_str().unwrap())?
    } else {
        Config::from_env()?
    };

    info!("Starting rcommerce v{} with config: {}", rcommerce_core::VERSION, config.server.host);

    match cli.command {
        Commands::Serve { host, port, skip_migrate, in_memory } => {
            if let Err(e) = security::check_not_root() {
                eprintln!("{}", e);
                std::process::exit(1);
            }

            let mut config = config;
            config.server.host = host;
            config.server.port = port;

            if in_memory {
                run_serve_in_memory(config).await?;
            } else {
                if !skip_migrate {
                    info!("Running database migrations...");
                    match run_migrations(&config).await {
                        Ok(_) => info!("Database migrations completed successfully"),
                        Err(e) => {
                            eprintln!("Database migration failed: {}", e);
                            eprintln!("Use --skip-migrate to start without migration");
                            std::process::exit(1);
                        }
                    }
                }
                run_serve(config).await?;
            }
        }

        Commands::Db { command } => {
            let pool = create_pool(&config).await?;
            let migrator = rcommerce_core::Migrator::new(pool);

            match command {
                DbCommands::Migrate => {
                    println!("{}", "Running database migrations...".yellow());
                    match migrator.migrate().await {
                        Ok(_) => println!("{}", "Migrations completed successfully.".green()),
                        Err(e) => {
                            eprintln!("{}", format!("Migration failed: {}", e).red());
                            std::process::exit(1);
                        }
                    }
                }
                DbCommands::Reset { force } => {
                    if !force {
                        println!("{}", "WARNING: This will DELETE ALL DATA!".red().bold());
                        print!("Type 'yes' to confirm: ");
                        use std::io::Write;
                        std::io::stdout().flush().unwrap();

                        let mut input = String::new();
                        std::io::stdin().read_line(&mut input).unwrap();

                        if input.trim() != "yes" {
                            println!("Aborted.");
                            return Ok(());
                        }
                    }

                    println!("{}", "Resetting database...".red());
                    match migrator.reset().await {
                        Ok(_) => println!("{}", "Database reset complete.".green()),
                        Err(e) => {
                            eprintln!("{}", format!("Reset failed: {}", e).red());
                            std::process::exit(1);
                        }
                    }
                }
                DbCommands::Status => match migrator.status().await {
                    Ok(status) => {
                        println!("{}", "Database Status".bold().underline());
                        println!("  Host: {}:{}", config.database.host, config.database.port);
                        println!("  Database: {}", config.database.database);
                        println!("  Applied migrations: {}", status.applied_migrations);
                        println!("  Jobs: {}", status.job_count);
                        println!("  Active jobs: {}", status.active_job_count);
                        println!("  Executions: {}", status.execution_count);
                    }
                    Err(e) => {
                        eprintln!("{}", format!("Failed to get status: {}", e).red());
                        std::process::exit(1);
                    }
                },
            }
        }

        Commands::Shell => {
            let pool = create_pool(&config).await?;
            let store = Arc::new(PostgresJobStore::new(pool));
            let queue_pool = RedisPool::new(config.cache.clone()).await.map_err(rcommerce_core::Error::from)?;
            let queue = Arc::new(RedisDispatchQueue::new(queue_pool, config.cache.key_prefix.clone()));
            let clock = Arc::new(SystemClock);
            let metrics = Arc::new(SchedulerMetrics::new());
            let scheduler =
                Arc::new(Scheduler::new(store, queue, clock, config.jobs.scheduler.clone(), metrics));

            commands::shell::Shell::new(scheduler).run().await?;
        }

        Commands::Setup { output } => {
            if let Err(e) = commands::setup::run_setup(output).await {
                eprintln!("{}", e.red());
                std::process::exit(1);
            }
        }

        Commands::Config => {
            println!("{}", "Current Configuration".bold().underline());
            println!("{}", toml::to_string_pretty(&config).unwrap_or_default());
        }
    }

    Ok(())
}

async fn create_pool(config: &Config) -> Result<sqlx::PgPool> {
    rcommerce_core::create_pool(
        &config.database.host,
        config.database.port,
        &config.database.database,
        &config.database.username,
        &config.database.password,
        config.database.pool_size,
    )
    .await
}

/// Run database migrations
async fn run_migrations(config: &Config) -> Result<()> {
    let pool = create_pool(config).await?;
    rcommerce_core::auto_migrate(&pool).await?;
    Ok(())
}

/// Boot the API, worker pool, and Safety Sync loop against Postgres/Redis.
async fn run_serve(config: Config) -> Result<()> {
    let pool = create_pool(&config).await?;
    let store = Arc::new(PostgresJobStore::new(pool));

    let redis_pool = RedisPool::new(config.cache.clone()).await.map_err(rcommerce_core::Error::from)?;
    let queue = Arc::new(RedisDispatchQueue::new(redis_pool, config.cache.key_prefix.clone()));

    let clock = Arc::new(SystemClock);
    let metrics = Arc::new(SchedulerMetrics::new());

    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        queue.clone(),
        clock,
        config.jobs.scheduler.clone(),
        metrics.clone(),
    ));

    let executor = Arc::new(Executor::new(
        &config.jobs.worker,
        config.jobs.retry.backoff(),
        store,
        queue,
        scheduler.clone(),
        Arc::new(EchoJobLogic),
        Arc::new(LoggingNotificationSink),
        Arc::new(DeadLetterSink::new(config.jobs.dead_letter.capacity)),
        metrics,
    ));

    if config.jobs.scheduler.enabled {
        tokio::spawn(scheduler.clone().run_safety_sync_loop());
    }
    tokio::spawn(executor.run());

    let state = rcommerce_api::AppState::new(scheduler);
    rcommerce_api::run(&config, state).await
}

/// Same as `run_serve` but against in-process backends, for local iteration
/// without a Postgres/Redis dependency.
async fn run_serve_in_memory(config: Config) -> Result<()> {
    let store = Arc::new(InMemoryJobStore::new());
    let queue = Arc::new(InMemoryDispatchQueue::new());
    let clock = Arc::new(SystemClock);
    let metrics = Arc::new(SchedulerMetrics::new());

    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        queue.clone(),
        clock,
        config.jobs.scheduler.clone(),
        metrics.clone(),
    ));

    let executor = Arc::new(Executor::new(
        &config.jobs.worker,
        config.jobs.retry.backoff(),
        store,
        queue,
        scheduler.clone(),
        Arc::new(EchoJobLogic),
        Arc::new(LoggingNotificationSink),
        Arc::new(DeadLetterSink::new(config.jobs.dead_letter.capacity)),
        metrics,
    ));

    if config.jobs.scheduler.enabled {
        tokio::spawn(scheduler.clone().run_safety_sync_loop());
    }
    tokio::spawn(executor.run());

    let state = rcommerce_api::AppState::new(scheduler);
    rcommerce_api::run(&config, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::parse_from(["rcommerce", "serve"]);
        assert!(matches!(cli.command, Commands::Serve { .. }));
    }

    #[test]
    fn test_cli_parse_shell() {
        let cli = Cli::parse_from(["rcommerce", "shell"]);
        assert!(matches!(cli.command, Commands::Shell));
    }
}
