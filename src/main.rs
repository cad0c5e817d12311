//! pagescribe main entry point
//!
//! This is the command-line interface for the pagescribe page capture
//! crawler.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pagescribe::caption::{CaptionService, ProviderRegistry};
use pagescribe::capture::HttpRenderer;
use pagescribe::config::{load_config_or_default, load_config_with_hash, validate, CliOverrides, Config};
use pagescribe::crawler::{CrawlOptions, Orchestrator};
use pagescribe::output::{load_statistics, print_crawl_summary, print_statistics};
use pagescribe::storage::{self, open_storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// pagescribe: capture and caption web pages
///
/// pagescribe crawls websites from seed URLs while respecting robots.txt,
/// per-domain rate limits and depth limits. Every page it visits is
/// captured and can be described by a captioning provider.
#[derive(Parser, Debug)]
#[command(name = "pagescribe")]
#[command(version)]
#[command(about = "Capture and caption web pages", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl from seed URLs, capturing every page reached
    Crawl {
        /// Seed URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Maximum link depth from the seeds
        #[arg(short, long)]
        depth: Option<u32>,

        /// Number of pages processed at once
        #[arg(long)]
        concurrency: Option<u32>,

        /// Minimum delay between requests to one domain, in milliseconds
        #[arg(long)]
        rate_limit: Option<u64>,

        /// Captioning provider
        #[arg(long)]
        provider: Option<String>,

        /// API key for the captioning provider
        #[arg(long, env = "PAGESCRIBE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Stop after this many pages have been captured
        #[arg(long)]
        max_urls: Option<usize>,

        /// Capture pages without captioning them
        #[arg(long)]
        no_caption: bool,

        /// Ignore robots.txt
        #[arg(long)]
        no_robots: bool,
    },

    /// Caption stored captures that have no caption yet
    Caption {
        /// Maximum number of captures to caption
        #[arg(short, long, default_value_t = 100)]
        limit: usize,

        /// Captioning provider
        #[arg(long)]
        provider: Option<String>,

        /// API key for the captioning provider
        #[arg(long, env = "PAGESCRIBE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Capture a single URL without crawling its links
    Single {
        /// URL to capture
        url: String,

        /// Capture without captioning
        #[arg(long)]
        no_caption: bool,

        /// API key for the captioning provider
        #[arg(long, env = "PAGESCRIBE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Show statistics from the database
    Stats,

    /// List the available captioning providers
    Providers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load_base_config(cli.config.as_deref())?;

    match cli.command {
        Command::Crawl {
            urls,
            depth,
            concurrency,
            rate_limit,
            provider,
            api_key,
            max_urls,
            no_caption,
            no_robots,
        } => {
            let overrides = CliOverrides {
                max_depth: depth,
                concurrency,
                rate_limit,
                respect_robots_txt: no_robots.then_some(false),
                provider,
                api_key,
                ..CliOverrides::default()
            };
            let config = apply_overrides(config, &overrides)?;
            handle_crawl(config, urls, max_urls, !no_caption).await
        }
        Command::Caption {
            limit,
            provider,
            api_key,
        } => {
            let overrides = CliOverrides {
                provider,
                api_key,
                ..CliOverrides::default()
            };
            let config = apply_overrides(config, &overrides)?;
            handle_caption(config, limit).await
        }
        Command::Single {
            url,
            no_caption,
            api_key,
        } => {
            let overrides = CliOverrides {
                api_key,
                ..CliOverrides::default()
            };
            let config = apply_overrides(config, &overrides)?;
            handle_single(config, &url, !no_caption).await
        }
        Command::Stats => handle_stats(&config),
        Command::Providers => {
            handle_providers(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagescribe=info,warn"),
            1 => EnvFilter::new("pagescribe=debug,info"),
            2 => EnvFilter::new("pagescribe=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or the defaults when none is given
fn load_base_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Ok(load_config_or_default(None)?)
        }
    }
}

fn apply_overrides(mut config: Config, overrides: &CliOverrides) -> anyhow::Result<Config> {
    overrides.apply(&mut config);
    validate(&config).context("Invalid command-line options")?;
    Ok(config)
}

fn open_shared_storage(config: &Config) -> anyhow::Result<storage::SharedStorage> {
    let path = Path::new(&config.storage.db_path);
    let storage = open_storage(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    Ok(storage::shared(storage))
}

/// Creates the configured caption service when captioning is wanted
fn build_captioner(config: &Config, wanted: bool) -> anyhow::Result<Option<CaptionService>> {
    if !wanted {
        return Ok(None);
    }

    let registry = ProviderRegistry::with_builtin();
    let service = CaptionService::from_config(&registry, &config.captioning).with_context(|| {
        format!(
            "Captioning provider '{}' is not usable (pass --no-caption to skip captioning)",
            config.captioning.provider
        )
    })?;
    tracing::info!("Captioning with {}", service.provider_name());
    Ok(Some(service))
}

fn build_orchestrator(config: Config, captioner: Option<CaptionService>) -> anyhow::Result<Orchestrator> {
    let storage = open_shared_storage(&config)?;
    let renderer = Arc::new(HttpRenderer::new(&config.crawler)?);
    Ok(Orchestrator::new(config, storage, renderer, captioner)?)
}

/// Handles the crawl command
async fn handle_crawl(
    config: Config,
    urls: Vec<String>,
    max_urls: Option<usize>,
    caption: bool,
) -> anyhow::Result<()> {
    let captioner = build_captioner(&config, caption)?;
    let orchestrator = build_orchestrator(config, captioner)?;

    let seeded = orchestrator.add_seeds(&urls)?;
    tracing::info!("Queued {} of {} seed URLs", seeded, urls.len());

    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            stop.stop();
        }
    });

    let stats = orchestrator
        .crawl(CrawlOptions {
            max_urls,
            caption_on_crawl: caption,
        })
        .await
        .context("Crawl failed")?;

    print_crawl_summary(&stats);
    Ok(())
}

/// Handles the caption command
async fn handle_caption(config: Config, limit: usize) -> anyhow::Result<()> {
    let captioner = build_captioner(&config, true)?;
    let orchestrator = build_orchestrator(config, captioner)?;

    let captioned = orchestrator.caption_pending(limit).await?;
    println!("Captioned {} captures", captioned);
    Ok(())
}

/// Handles the single command
async fn handle_single(config: Config, url: &str, caption: bool) -> anyhow::Result<()> {
    let captioner = build_captioner(&config, caption)?;
    let orchestrator = build_orchestrator(config, captioner)?;

    let Some(single) = orchestrator.capture_single(url, caption).await? else {
        bail!("{} was not captured (not HTML or permanently unavailable)", url);
    };

    let capture = &single.capture;
    println!("URL: {}", capture.url);
    println!("Status: {}", capture.status_code);
    println!("Title: {}", capture.title.as_deref().unwrap_or("(none)"));
    println!("Links: {}", capture.links.len());
    if let Some(path) = &capture.screenshot_path {
        println!("Screenshot: {}", path);
    }
    if let Some(caption) = &single.caption {
        println!("\nCaption ({} / {}):\n{}", caption.provider, caption.model, caption.text);
    }
    Ok(())
}

/// Handles the stats command
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.db_path);

    let storage = open_shared_storage(config)?;
    let store = storage::lock(&storage)?;
    let stats = load_statistics(&*store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the providers command
fn handle_providers(config: &Config) {
    let registry = ProviderRegistry::with_builtin();
    println!("Available captioning providers:");
    for name in registry.names() {
        let marker = if name == config.captioning.provider.to_lowercase() {
            " (configured)"
        } else {
            ""
        };
        println!("  - {}{}", name, marker);
    }
}
