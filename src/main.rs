//! # Post Filter Grid CLI (`pfg`)
//!
//! Runs the grid pipeline headlessly against a markup file, serves the
//! reference search endpoint, and validates markup.
//!
//! ## Usage
//!
//! ```bash
//! pfg --config ./config/pfg.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pfg query --grid <file>` | Restore grids from a URL and print what is visible |
//! | `pfg serve --grid <file>` | Start the reference search endpoint |
//! | `pfg check --grid <file>` | Validate markup |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use post_filter_grid::check::check_markup;
use post_filter_grid::config::{self, Config};
use post_filter_grid::grid::GridSnapshot;
use post_filter_grid::logging;
use post_filter_grid::models::{self, Card};
use post_filter_grid::runtime::Page;
use post_filter_grid::server;
use post_filter_grid::session::{Location, MemoryLocation};

/// Post Filter Grid CLI: faceted filtering, search and sort for card grids.
#[derive(Parser)]
#[command(
    name = "pfg",
    about = "Post Filter Grid: filter, search and sort card grids with URL state",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pfg.toml`. A missing file falls back to
    /// built-in defaults (local search, 250ms debounce).
    #[arg(long, global = true, default_value = "./config/pfg.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore every grid from a page URL and print the visible cards.
    ///
    /// Waits for the debounce timer and any remote search to settle, then
    /// prints each grid's visible cards in container order along with the
    /// normalized URL.
    Query {
        /// Markup file (JSON) describing one grid or `{"grids": [...]}`.
        #[arg(long)]
        grid: PathBuf,

        /// Page URL whose query string holds the control state.
        #[arg(long, default_value = "http://localhost/")]
        url: String,

        /// Print a JSON document instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Start the reference search endpoint over the cards in a markup file.
    Serve {
        #[arg(long)]
        grid: PathBuf,
    },

    /// Validate a markup file and print findings.
    Check {
        #[arg(long)]
        grid: PathBuf,
    },
}

fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_or_default(&cli.config)?;
    logging::init(&cfg.log);

    match cli.command {
        Commands::Query { grid, url, json } => {
            run_query(&cfg, &grid, &url, json).await?;
        }
        Commands::Serve { grid } => {
            let markups = models::load_markup(&grid)?;
            let cards: Vec<Card> = markups.into_iter().flat_map(|m| m.cards).collect();
            server::run_server(&cfg, &cards).await?;
        }
        Commands::Check { grid } => {
            let markups = models::load_markup(&grid)?;
            let findings = check_markup(&markups);
            if findings.is_empty() {
                println!("OK: {} grid(s), no findings.", markups.len());
            } else {
                for f in &findings {
                    println!("[{}] {}", f.grid, f.message);
                }
                anyhow::bail!("{} finding(s)", findings.len());
            }
        }
    }

    Ok(())
}

async fn run_query(cfg: &Config, grid: &Path, url: &str, json: bool) -> Result<()> {
    let markups = models::load_markup(grid)?;
    let location = Arc::new(MemoryLocation::new(url));
    let mut page = Page::new(markups, location.clone(), &cfg.search)?;

    page.restore_all();
    page.settle().await;

    let snapshots: Vec<GridSnapshot> = page.grids().map(|r| r.grid().snapshot()).collect();
    let final_url = location.href();

    if json {
        let doc = serde_json::json!({ "url": final_url, "grids": snapshots });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("url: {}", final_url);
    for snap in &snapshots {
        println!();
        println!(
            "grid {}: {} of {} visible (sort: {}, panel: {})",
            snap.id,
            snap.visible.len(),
            snap.total,
            snap.sort,
            if snap.panel_open { "open" } else { "closed" }
        );
        if !snap.query.is_empty() {
            println!("  search: \"{}\"", snap.query);
        }
        if snap.no_results {
            println!("  No results.");
        }
        for (i, card) in snap.visible.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(card.date, 0)
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            println!("  {}. [{}] {} ({})", i + 1, card.id, card.title, date);
        }
    }
    Ok(())
}
