//! Demo binary: a deposit service and its client talking over in-memory
//! queues.

mod cli;
mod demo;

use clap::Parser;
use mqframe::config::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(workers) = cli.workers {
        settings.server.workers = workers;
    }

    let balances = demo::run(&settings, &cli).await?;
    for (account, balance) in balances {
        println!("{account}: {balance}");
    }
    Ok(())
}
