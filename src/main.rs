//! # newsclip
//!
//! A news clipping pipeline that extracts articles from Taiwanese news
//! sites, queues the user's selections, and compiles them into a Word
//! clipping document built from a .docx template.
//!
//! ## Features
//!
//! - Per-source extraction strategies for 15 outlets (壹蘋網, 中天網,
//!   知新聞, 東森網, 周刊王, 三立網, 東森雲, 聯合新聞網, 中時新聞網,
//!   鏡報, TVBS, 鏡週刊, 鏡新聞, 自由時報, 中央社)
//! - Static HTTP fetching with a headless-browser path for
//!   script-rendered outlets
//! - Best-effort batches: a failed article becomes a placeholder block,
//!   never an aborted document
//! - Template-faithful output: every block is a deep copy of the
//!   template's own title paragraph and metadata table
//!
//! ## Usage
//!
//! ```sh
//! newsclip fetch https://www.cna.com.tw/news/asoc/202608290001.aspx
//! newsclip export -o 剪報.docx https://udn.com/... https://www.setn.com/...
//! newsclip sources
//! ```
//!
//! ## Architecture
//!
//! The pipeline runs in three stages:
//! 1. **Routing**: map the URL's hostname to a source strategy
//! 2. **Extraction**: fetch (static or browser-rendered) and normalize
//! 3. **Compilation**: clone template blocks and fill one per article

use std::error::Error;
use std::fs;
use std::path::Path;

use clap::Parser;
use tracing::{debug, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod browser;
mod cli;
mod compile;
mod config;
mod error;
mod extract;
mod fetch;
mod models;
mod queue;
mod service;
mod sources;
mod utils;

use cli::{Cli, Command};
use config::Config;
use error::ClipError;
use extract::Engine;
use fetch::Backend;
use service::{ClipService, SubmitOutcome};
use sources::{FetchMode, REGISTRY};
use utils::extract_first_url;

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("newsclip starting up");

    let args = Cli::parse();
    let config = Config::load(args.config.as_deref())?;
    debug!(?config, "Effective configuration");

    let backend = Backend::new(config.static_timeout(), config.dynamic_timeout())?;
    let engine = Engine::new(backend);

    match args.command {
        Command::Fetch { url, json } => run_fetch(&engine, &url, json).await?,
        Command::Export {
            input,
            urls,
            output,
        } => run_export(engine, &config, input.as_deref(), urls, output.as_deref()).await?,
        Command::Sources => run_sources(),
    }

    info!(elapsed = ?start_time.elapsed(), "newsclip finished");
    Ok(())
}

/// Extract one article and print it to stdout.
async fn run_fetch(engine: &Engine, text: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let url = extract_first_url(text).ok_or(ClipError::NotAUrl)?;
    let result = engine.extract(url, None).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.rendered());
    }
    Ok(())
}

/// Queue every URL through one session, then compile the queue.
async fn run_export(
    engine: Engine,
    config: &Config,
    input: Option<&str>,
    mut urls: Vec<String>,
    output: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    if let Some(path) = input {
        let listed = fs::read_to_string(path)?;
        urls.extend(
            listed
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }
    if urls.is_empty() {
        return Err(Box::new(ClipError::EmptyQueue));
    }

    let service = ClipService::new(
        engine,
        config.template_path.clone(),
        config.output_dir.clone(),
    );
    for url in &urls {
        match service.submit_url("cli", url).await {
            SubmitOutcome::Added { title, count } => {
                println!("[{count}] {title}");
            }
            SubmitOutcome::Duplicate { title } => {
                println!("已在清單中，略過: {title}");
            }
            SubmitOutcome::Rejected { reason } => {
                println!("{reason}");
            }
        }
    }

    let written = service.export("cli", output.map(Path::new)).await?;
    println!("已輸出: {}", written.display());
    Ok(())
}

/// Print the source registry as a fixed-width table.
fn run_sources() {
    println!("{:<12}  {:<8}  domains", "label", "mode");
    for source in REGISTRY {
        let mode = match source.strategy.fetch_mode {
            FetchMode::Static if source.strategy.retry_with_dynamic => "static+",
            FetchMode::Static => "static",
            FetchMode::Dynamic => "dynamic",
        };
        println!(
            "{:<12}  {:<8}  {}",
            source.label,
            mode,
            source.strategy.domains.join(", ")
        );
    }
}
