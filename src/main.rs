//! fsdb - FacturaScripts database inspector.
//!
//! Connects to the configured MySQL database, runs one command and
//! disconnects.

use clap::Parser;
use facturascripts_db::DbError;
use facturascripts_db::config::{Command, Config};
use facturascripts_db::db::{ConnectionHandle, MysqlEngine};
use facturascripts_db::models::TableDefinition;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output stays clean on stdout
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(
    engine: &MysqlEngine,
    handle: &ConnectionHandle,
    command: &Command,
) -> Result<bool, Box<dyn std::error::Error>> {
    match command {
        Command::Version => {
            println!("{}", engine.version(handle).await);
        }
        Command::Tables => {
            let tables = engine.list_tables(handle).await;
            if tables.is_empty() {
                let message = engine.error_message(handle).await;
                if !message.is_empty() {
                    return Err(message.into());
                }
            }
            for table in tables {
                println!("{}", table);
            }
        }
        Command::Columns { table } => {
            let columns = engine.columns(handle, table).await?;
            println!("{}", serde_json::to_string_pretty(&columns)?);
        }
        Command::Check { files } => {
            let mut compatible = true;
            for path in files {
                for definition in TableDefinition::load_file(path)? {
                    let report = engine.check_table(handle, &definition).await?;
                    if report.is_compatible() {
                        println!("{}: ok", report.table);
                        continue;
                    }
                    compatible = false;
                    if !report.exists {
                        println!("{}: table does not exist", report.table);
                        continue;
                    }
                    for issue in &report.issues {
                        println!("{}: {}", report.table, issue);
                    }
                }
            }
            return Ok(compatible);
        }
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    let db_config = config.db_config()?;
    info!(
        target_db = %db_config.masked_url(),
        "Starting fsdb v{}",
        env!("CARGO_PKG_VERSION")
    );

    let engine = MysqlEngine::new(db_config);
    let handle = match engine.connect().await {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Cannot connect");
            eprintln!("Error: {}", e.diagnostic());
            return Ok(ExitCode::FAILURE);
        }
    };

    let result = run(&engine, &handle, &config.command).await;

    engine.close(&handle).await;
    engine.shutdown().await;

    match result {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e) => {
            error!(error = %e, "Command failed");
            match e.downcast_ref::<DbError>() {
                Some(db_err) => eprintln!("Error: {}", db_err.diagnostic()),
                None => eprintln!("Error: {}", e),
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
