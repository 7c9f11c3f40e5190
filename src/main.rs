mod accounts;
mod api_client;
mod auth;
mod config;
mod data;
mod error;
mod reporting;
mod runner;
mod store;
#[cfg(test)]
mod test_support;

use chrono::Local;
use clap::Parser;
use config::Config;
use error::Error;
use log::{error, info};

/// Loads the last seven days of campaign metrics into a local SQLite database.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(flatten)]
    config: Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    env_logger::init();
    info!("run started at {}", Local::now());

    let mut stdout = std::io::stdout();
    match runner::run(args.config, &mut stdout).await {
        Ok(summary) => {
            info!(
                "stored {} rows for {} accounts",
                summary.rows, summary.accounts
            );
        }
        Err(err) => {
            error!("failed to load campaign metrics: {}", err);
            std::process::exit(1);
        }
    }

    Ok(())
}
