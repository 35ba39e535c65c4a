//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use webai_core::pipeline::{
    CrawlSummary, IngestResult, ProgressReporter, UploadedText, ingest,
};
use webai_core::session::Session;
use webai_crawler::{CrawlResult, CrawlState, Crawler};
use webai_shared::{AppConfig, CrawlConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// WebAI: chat with websites and documents.
#[derive(Parser)]
#[command(
    name = "webai",
    version,
    about = "Crawl a website to a bounded depth and prepare its content for question answering.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.webai/webai.toml.
    #[arg(long, global = true, env = "WEBAI_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a site and list the pages that would be ingested.
    Crawl {
        /// Seed URL.
        url: String,

        /// Hops to follow from the seed (1-5).
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=5))]
        depth: Option<u32>,

        /// Stop after this many pages.
        #[arg(long)]
        max_pages: Option<usize>,

        /// Concurrent requests.
        #[arg(long)]
        concurrency: Option<u32>,

        /// Print a JSON summary instead of a URL list.
        #[arg(long)]
        json: bool,
    },

    /// Crawl a site and/or read a text file, then split the content into chunks.
    Ingest {
        /// Website URL (optional).
        #[arg(short, long)]
        url: Option<String>,

        /// File with already-extracted document text (optional).
        #[arg(short, long)]
        text_file: Option<PathBuf>,

        /// Hops to follow from the seed (1-5).
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=5))]
        depth: Option<u32>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// clean for command output.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "webai=info",
        1 => "webai=debug",
        _ => "webai=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Crawl {
            url,
            depth,
            max_pages,
            concurrency,
            json,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_crawl(&config, &url, depth, max_pages, concurrency, json).await
        }
        Command::Ingest {
            url,
            text_file,
            depth,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_ingest(&config, url, text_file.as_deref(), depth).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// Cancel the returned token when the user presses Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after in-flight requests");
            trigger.cancel();
        }
    });
    token
}

// ---------------------------------------------------------------------------
// crawl
// ---------------------------------------------------------------------------

async fn cmd_crawl(
    config: &AppConfig,
    url: &str,
    depth: Option<u32>,
    max_pages: Option<usize>,
    concurrency: Option<u32>,
    json: bool,
) -> Result<()> {
    let mut crawl_config = CrawlConfig::from(config);
    if let Some(n) = max_pages {
        crawl_config.max_pages = n.max(1);
    }
    if let Some(n) = concurrency {
        crawl_config.concurrency = n.max(1);
    }
    let depth = depth.unwrap_or(config.crawl.max_depth);

    info!(url, depth, "crawling");

    let crawler = Crawler::new(crawl_config)?;
    let result = crawler
        .crawl_with_cancellation(url, depth, cancel_on_interrupt())
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&crawl_json(&result))?);
    } else {
        print_crawl(&result);
    }

    Ok(())
}

fn crawl_json(result: &CrawlResult) -> serde_json::Value {
    let pages: Vec<serde_json::Value> = result
        .pages
        .iter()
        .map(|p| {
            serde_json::json!({
                "url": p.url,
                "final_url": p.final_url,
                "depth": p.depth,
                "status": p.status_code,
                "title": p.title,
                "content_hash": p.content_hash,
                "fetched_at": p.fetched_at.to_rfc3339(),
            })
        })
        .collect();

    let failures: Vec<serde_json::Value> = result
        .failures
        .iter()
        .map(|f| {
            serde_json::json!({
                "url": f.url,
                "depth": f.depth,
                "reason": f.reason.to_string(),
            })
        })
        .collect();

    serde_json::json!({
        "summary": CrawlSummary::from(result),
        "pages": pages,
        "failures": failures,
    })
}

fn print_crawl(result: &CrawlResult) {
    for page in &result.pages {
        println!("{}  {}", page.depth, page.url);
    }

    if !result.failures.is_empty() {
        println!();
        println!("  Failed:");
        for failure in &result.failures {
            println!("  {}  {} ({})", failure.depth, failure.url, failure.reason);
        }
    }

    println!();
    println!("  Pages:    {}", result.pages.len());
    println!("  Failed:   {}", result.failures.len());
    println!("  Skipped:  {} off-site links", result.links_rejected);
    if result.hit_page_limit {
        println!("  Stopped at the page limit");
    }
    if result.state == CrawlState::Cancelled {
        println!("  Cancelled before the crawl finished");
    }
    println!("  Time:     {:.1}s", result.duration.as_secs_f64());
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

async fn cmd_ingest(
    config: &AppConfig,
    url: Option<String>,
    text_file: Option<&Path>,
    depth: Option<u32>,
) -> Result<()> {
    if url.is_none() && text_file.is_none() {
        return Err(eyre!("nothing to ingest: pass --url, --text-file, or both"));
    }

    let uploaded = text_file.map(read_upload).transpose()?;

    let mut session = Session::new();
    session.set_max_depth(depth.unwrap_or(config.crawl.max_depth))?;
    session.proceed();

    info!(session = %session.id(), depth = session.max_depth(), "starting ingest");

    let request = session.ingest_request(config, url, uploaded);
    let reporter = CliProgress::new();

    match ingest(&request, &reporter, cancel_on_interrupt()).await {
        Ok(result) => {
            println!();
            println!("  Processing completed!");
            println!("  Documents: {}", result.documents.len());
            println!("  Chunks:    {}", result.chunks.len());
            if let Some(crawl) = &result.crawl {
                println!("  Pages:     {} ({} failed)", crawl.pages_fetched, crawl.pages_failed);
            }
            println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
            println!();
            session.install_corpus(result)?;
            Ok(())
        }
        Err(e) => {
            reporter.spinner.finish_and_clear();
            session.fail_ingest();
            Err(eyre!("failed to ingest content: {e}"))
        }
    }
}

fn read_upload(path: &Path) -> Result<UploadedText> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read '{}': {e}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedText { name, text })
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn crawl_finished(&self, summary: &CrawlSummary) {
        self.spinner.set_message(format!(
            "Crawled {} pages ({} failed)",
            summary.pages_fetched, summary.pages_failed
        ));
    }

    fn done(&self, _result: &IngestResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
