//! Keiba Crawler
//!
//! Crawls race results from db.netkeiba.com and logs in for session cookies.

mod cli;
mod config;
mod crawl;
mod error;
mod output;
mod scraper;
mod types;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for JSON output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keiba_crawler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            start_year,
            start_month,
            end_year,
            end_month,
            output,
            render,
            cookies,
            page_size,
        } => {
            let range = cli::search_range(start_year, start_month, end_year, end_month);
            cli::run_crawl(range, output, render, cookies, page_size).await
        }
        Commands::Login {
            email,
            password,
            output,
        } => cli::run_login(email, password, output).await,
    }
}
