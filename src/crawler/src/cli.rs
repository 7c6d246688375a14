//! CLI commands for keiba-crawler.
//!
//! Supports crawling race results and logging in for a session cookie.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{Datelike, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::AppConfig;
use crate::crawl::crawl;
use crate::output::JsonLinesSink;
use crate::scraper::auth::{login_with_chrome, Credentials};
use crate::scraper::historical::SearchRange;
use crate::scraper::{ChromiumLauncher, Fetcher, HttpClient, RenderFetcher};
use crate::types::AuthCookieSet;

const JST_OFFSET_SECS: i32 = 9 * 3600;

#[derive(Parser)]
#[command(name = "keiba-crawler")]
#[command(version, about = "Race result crawler for db.netkeiba.com", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl race results for a range of months
    Crawl {
        /// First year to search (default: current year in JST)
        #[arg(long)]
        start_year: Option<i32>,

        /// First month to search (default: current month in JST)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        start_month: Option<u32>,

        /// Last year to search (default: current year in JST)
        #[arg(long)]
        end_year: Option<i32>,

        /// Last month to search (default: current month in JST)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        end_month: Option<u32>,

        /// JSON lines output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render race pages in headless Chrome
        #[arg(long)]
        render: bool,

        /// Cookie JSON written by `login`, sent with every HTTP request
        #[arg(long, value_name = "FILE")]
        cookies: Option<PathBuf>,

        /// Races per listing page
        #[arg(long)]
        page_size: Option<u32>,
    },

    /// Log in and save the session cookies
    Login {
        /// Account email / login id
        #[arg(long, env = "NETKEIBA_EMAIL")]
        email: String,

        /// Account password
        #[arg(long, env = "NETKEIBA_PASSWORD", hide_env_values = true)]
        password: String,

        /// Cookie JSON output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Fill unset bounds with the current month in Japan
pub fn search_range(
    start_year: Option<i32>,
    start_month: Option<u32>,
    end_year: Option<i32>,
    end_month: Option<u32>,
) -> SearchRange {
    let jst = FixedOffset::east_opt(JST_OFFSET_SECS).expect("JST offset is in range");
    let today = Utc::now().with_timezone(&jst).date_naive();

    SearchRange {
        start_year: start_year.unwrap_or(today.year()),
        start_month: start_month.unwrap_or(today.month()),
        end_year: end_year.unwrap_or(today.year()),
        end_month: end_month.unwrap_or(today.month()),
    }
}

/// Run a crawl.
pub async fn run_crawl(
    range: SearchRange,
    output: Option<PathBuf>,
    render: bool,
    cookies: Option<PathBuf>,
    page_size: Option<u32>,
) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if render {
        config.render.enabled = true;
    }
    if let Some(size) = page_size {
        config.crawl.page_size = size;
    }
    if let Some(path) = output {
        config.output.path = Some(path.to_string_lossy().to_string());
    }

    let cookies = match cookies {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read cookies from {}", path.display()))?;
            Some(serde_json::from_str::<AuthCookieSet>(&json)?)
        }
        None => None,
    };

    info!(?range, render = config.render.enabled, "Starting crawl");

    let http = HttpClient::new(&config.crawl, cookies.as_ref())
        .context("Cookie file cannot be used for requests")?;
    let renderer = config.render.enabled.then(|| {
        RenderFetcher::new(
            ChromiumLauncher::new(config.render.clone()),
            Duration::from_secs(config.render.navigation_timeout_secs),
        )
    });
    let fetcher = Fetcher::new(http, renderer);

    let result = match &config.output.path {
        Some(path) => {
            let mut sink = JsonLinesSink::create(path)?;
            crawl(&fetcher, &config.site, &config.crawl, &range, &mut sink).await
        }
        None => {
            let mut sink = JsonLinesSink::stdout();
            crawl(&fetcher, &config.site, &config.crawl, &range, &mut sink).await
        }
    };

    // Browser goes away even when the crawl failed
    fetcher.shutdown().await;

    let summary = result?;
    eprintln!(
        "Crawled {} races from {} listing pages ({} failed)",
        summary.races, summary.pages, summary.failed
    );

    Ok(())
}

/// Log in and write the cookie set.
pub async fn run_login(email: String, password: String, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let credentials = Credentials { email, password };

    let cookies = login_with_chrome(&config.site, &config.render, &credentials).await?;
    let json = serde_json::to_string_pretty(&cookies)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            eprintln!("Saved {} cookies to {}", cookies.0.len(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}
