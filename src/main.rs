//! # Bulletin Monitor CLI
//!
//! Command-line entry points for the change-detection pipeline.
//!
//! ## Subcommands
//!
//! - `crawl`: Run every worklist URL through the pipeline and record changes
//! - `discover`: Grow the worklist from the configured hubs
//! - `extract`: Fetch one URL and print its canonical text and classification
//!
//! Configuration problems (unreadable rules, missing worklist, bad
//! patterns) are reported before any URL is processed. Per-URL failures
//! are logged and counted but never abort a run.

mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use bulletin_monitor::analysis::{Classifier, canonicalize, derive_title, find_effective_date, find_form_id};
use bulletin_monitor::crawler::{
    ChromiumRenderer, CrawlSession, CrawlerConfig, Fetcher, LinkDiscoverer, RenderMode, Renderer, RetryPolicy,
};
use bulletin_monitor::extract::{ContentExtractor, DocumentKind, HtmlExtractConfig, PdfExtractConfig, detect_mime};
use bulletin_monitor::pipeline::{Orchestrator, UrlOutcome, discover_hubs, load_worklist};
use bulletin_monitor::rules::{SourceRules, TopicRules};
use bulletin_monitor::store::{Database, LocalObjectStore};
use clap::{ArgAction, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

#[derive(Parser)]
#[command(author, version, about = "Watch government bulletin pages and record what changed", long_about = None)]
struct Cli {
    /// Also write daily-rotated logs to this directory
    #[arg(long, global = true, env = "LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process every URL in the worklist and record new versions
    Crawl(CrawlArgs),

    /// Discover document URLs from configured hubs and append them to the worklist
    Discover(DiscoverArgs),

    /// Fetch one URL and print its extracted text and classification
    Extract(ExtractArgs),
}

#[derive(Args, Debug, Clone)]
struct CrawlerOpts {
    /// User agent for requests and robots.txt matching
    #[arg(long, env = "CRAWLER_USER_AGENT", default_value = "bulletin-monitor/0.2")]
    user_agent: String,

    /// Verify TLS certificates
    #[arg(long, env = "CRAWLER_VERIFY_TLS", default_value_t = true, action = ArgAction::Set)]
    verify_tls: bool,

    /// Minimum seconds between requests to one domain when robots.txt sets no crawl-delay
    #[arg(long, env = "CRAWLER_MIN_DELAY", default_value_t = 0.5)]
    min_delay: f64,

    /// Page fetch timeout in seconds
    #[arg(long, env = "CRAWLER_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// robots.txt fetch timeout in seconds
    #[arg(long, env = "CRAWLER_ROBOTS_TIMEOUT", default_value_t = 8)]
    robots_timeout: u64,

    /// Headless render timeout in seconds
    #[arg(long, env = "CRAWLER_RENDER_TIMEOUT", default_value_t = 60)]
    render_timeout: u64,

    /// Maximum attempts for transient failures
    #[arg(long, env = "CRAWLER_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// Headless render fallback: auto, always or off
    #[arg(long, env = "CRAWLER_RENDER", default_value = "auto")]
    render: RenderMode,

    /// Maximum sitemap index nesting followed during discovery
    #[arg(long, env = "CRAWLER_SITEMAP_DEPTH", default_value_t = 2)]
    sitemap_depth: u32,
}

impl CrawlerOpts {
    fn config(&self) -> anyhow::Result<CrawlerConfig> {
        if !self.min_delay.is_finite() || self.min_delay < 0.0 {
            return Err(anyhow!("--min-delay must be a non-negative number of seconds"));
        }
        let retry = RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            ..RetryPolicy::default()
        };

        Ok(CrawlerConfig::builder()
            .user_agent(self.user_agent.clone())
            .verify_tls(self.verify_tls)
            .default_delay(Duration::from_secs_f64(self.min_delay))
            .fetch_timeout(Duration::from_secs(self.timeout))
            .robots_timeout(Duration::from_secs(self.robots_timeout))
            .render_timeout(Duration::from_secs(self.render_timeout))
            .retry(retry)
            .render_mode(self.render)
            .sitemap_max_depth(self.sitemap_depth)
            .build())
    }

    /// Fetcher plus the renderer it uses, so the browser can be shut down
    fn fetcher(&self) -> anyhow::Result<(Fetcher, Option<Arc<ChromiumRenderer>>)> {
        let config = self.config()?;
        let renderer = (config.render_mode != RenderMode::Off)
            .then(|| Arc::new(ChromiumRenderer::new(config.user_agent.clone(), config.render_timeout)));

        let mut fetcher = Fetcher::new(CrawlSession::shared(config)?);
        if let Some(renderer) = renderer.as_ref() {
            fetcher = fetcher.with_renderer(renderer.clone() as Arc<dyn Renderer>);
        }
        Ok((fetcher, renderer))
    }
}

#[derive(Args, Debug, Clone)]
struct ExtractOpts {
    /// Run OCR on PDFs without a usable text layer
    #[arg(long, env = "PDF_OCR_ENABLED", default_value_t = true, action = ArgAction::Set)]
    ocr: bool,

    /// OCR render resolution
    #[arg(long, env = "PDF_OCR_DPI", default_value_t = 300)]
    ocr_dpi: u32,

    /// Tesseract language
    #[arg(long, env = "PDF_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Read at most this many PDF pages
    #[arg(long, env = "PDF_MAX_PAGES")]
    pdf_max_pages: Option<usize>,

    /// Tesseract executable
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: PathBuf,

    /// pdftoppm executable used to rasterize pages for OCR
    #[arg(long, env = "PDFTOPPM_CMD", default_value = "pdftoppm")]
    pdftoppm_cmd: PathBuf,

    /// Topic rules file; the bundled rules are used when omitted
    #[arg(long, env = "TOPIC_RULES")]
    topics: Option<PathBuf>,
}

impl ExtractOpts {
    fn pdf_config(&self) -> PdfExtractConfig {
        PdfExtractConfig {
            ocr_enabled: self.ocr,
            ocr_dpi: self.ocr_dpi,
            ocr_lang: self.ocr_lang.clone(),
            max_pages: self.pdf_max_pages,
            tesseract_cmd: self.tesseract_cmd.clone(),
            pdftoppm_cmd: self.pdftoppm_cmd.clone(),
            ..PdfExtractConfig::default()
        }
    }

    fn extractor(&self) -> ContentExtractor {
        ContentExtractor::new(HtmlExtractConfig::default(), self.pdf_config())
    }

    fn classifier(&self) -> anyhow::Result<Classifier> {
        let rules = match self.topics.as_ref() {
            Some(path) => TopicRules::load(path)?,
            None => TopicRules::bundled()?,
        };
        Ok(Classifier::new(&rules)?)
    }
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Worklist file, one URL per line
    #[arg(short, long, env = "SEED_FILE", default_value = "urls.txt")]
    worklist: PathBuf,

    /// Database path
    #[arg(long, env = "DATABASE_PATH", default_value = "monitor.db")]
    database: PathBuf,

    /// Directory archiving raw fetched bytes
    #[arg(long, env = "RAW_STORE_DIR", default_value = ".bulletin-monitor/raw")]
    raw_dir: PathBuf,

    /// Sources file used to attribute documents to jurisdictions
    #[arg(long, env = "SOURCES_FILE")]
    sources: Option<PathBuf>,

    /// URLs processed concurrently; per-domain spacing still applies
    #[arg(short, long, default_value_t = 1)]
    concurrency: usize,

    #[command(flatten)]
    crawler: CrawlerOpts,

    #[command(flatten)]
    extract: ExtractOpts,
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// Sources file listing hubs
    #[arg(long, env = "SOURCES_FILE", default_value = "rules/sources.yaml")]
    sources: PathBuf,

    /// Worklist file to append to
    #[arg(short, long, env = "SEED_FILE", default_value = "urls.txt")]
    worklist: PathBuf,

    /// Append at most this many new URLs; 0 appends all
    #[arg(long, env = "DISCOVER_MAX_NEW", default_value_t = 0)]
    max_new: usize,

    #[command(flatten)]
    crawler: CrawlerOpts,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// URL to fetch
    #[arg(required = true)]
    url: String,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(flatten)]
    crawler: CrawlerOpts,

    #[command(flatten)]
    extract: ExtractOpts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _telemetry = telemetry::init_tracing_subscriber(cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Crawl(args) => crawl_command(args).await?,
        Commands::Discover(args) => discover_command(args).await?,
        Commands::Extract(args) => extract_command(args).await?,
    }

    Ok(())
}

#[instrument(skip_all)]
async fn crawl_command(args: CrawlArgs) -> anyhow::Result<()> {
    // configuration first, so a bad setup fails before any URL is touched
    let urls = load_worklist(&args.worklist)?;
    let sources = args.sources.as_ref().map(|p| SourceRules::load(p)).transpose()?;
    let classifier = args.extract.classifier()?;
    let (fetcher, renderer) = args.crawler.fetcher()?;

    if urls.is_empty() {
        warn!(worklist = %args.worklist.display(), "No URLs to process");
        return Ok(());
    }

    let db = Database::new_from_path(&args.database.to_string_lossy())
        .await
        .with_context(|| format!("opening database {}", args.database.display()))?;
    let objects = LocalObjectStore::new(&args.raw_dir);

    let mut orchestrator =
        Orchestrator::new(fetcher, args.extract.extractor(), classifier, Arc::new(db), Arc::new(objects));
    if let Some(sources) = sources {
        orchestrator = orchestrator.with_sources(Arc::new(sources));
    }

    info!(urls = urls.len(), concurrency = args.concurrency, "Starting crawl");

    let progress_bar = ProgressBar::new(urls.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")?
            .progress_chars("##-"),
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<(String, UrlOutcome)>();
    let bar = progress_bar.clone();
    let reporter = tokio::spawn(async move {
        while let Some((url, outcome)) = rx.recv().await {
            if outcome.is_failure() {
                bar.println(format!("{url}: {outcome}"));
            }
            bar.set_message(url);
            bar.inc(1);
        }
    });

    let summary = orchestrator.run(&urls, args.concurrency, Some(tx)).await;
    reporter.await?;
    progress_bar.finish_with_message("done");

    if let Some(renderer) = renderer {
        renderer.shutdown().await;
    }

    println!("{summary}");
    Ok(())
}

#[instrument(skip_all)]
async fn discover_command(args: DiscoverArgs) -> anyhow::Result<()> {
    let rules = SourceRules::load(&args.sources)?;
    let (fetcher, renderer) = args.crawler.fetcher()?;
    let discoverer = LinkDiscoverer::new(fetcher);

    let max_new = (args.max_new > 0).then_some(args.max_new);
    let appended = discover_hubs(&discoverer, &rules, &args.worklist, max_new).await?;

    if let Some(renderer) = renderer {
        renderer.shutdown().await;
    }

    println!(
        "Appended {} new URLs to {}",
        appended.len(),
        args.worklist.display()
    );
    Ok(())
}

#[instrument(skip_all, fields(url = %args.url))]
async fn extract_command(args: ExtractArgs) -> anyhow::Result<()> {
    let classifier = args.extract.classifier()?;
    let extractor = args.extract.extractor();
    let (fetcher, renderer) = args.crawler.fetcher()?;

    let response = fetcher.fetch(&args.url).await;
    if let Some(renderer) = renderer {
        renderer.shutdown().await;
    }
    let response = response?;

    let mime = detect_mime(response.content_type().as_deref(), &args.url);
    let kind = DocumentKind::classify(&mime, &args.url)?;
    let text = extractor
        .extract(kind, response.body, &args.url)
        .await?
        .ok_or_else(|| anyhow!("no usable text extracted from {}", args.url))?;

    let normalized = canonicalize(&text);
    let classification = classifier.classify(&normalized);
    let title = derive_title(&normalized);

    match args.format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "url": args.url,
                "mime": mime,
                "title": title,
                "topic": classification.topic,
                "score": classification.score,
                "effective_date": find_effective_date(&normalized),
                "form_id": find_form_id(&normalized),
                "text": normalized,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("Title: {}", title);
            println!("Topic: {} (score {})", classification.topic, classification.score);
            println!("MIME:  {}", mime);
            println!();
            println!("{}", normalized);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_args(args: &[&str]) -> ExtractArgs {
        let argv = ["bulletin-monitor", "extract", "https://e.gov/notice.pdf"]
            .into_iter()
            .chain(args.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Extract(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_timeouts_reach_crawler_config() {
        let args = extract_args(&["--robots-timeout", "3", "--render-timeout", "15"]);
        let config = args.crawler.config().unwrap();

        assert_eq!(config.robots_timeout, Duration::from_secs(3));
        assert_eq!(config.render_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_ocr_tool_paths_reach_pdf_config() {
        let args = extract_args(&[
            "--tesseract-cmd",
            "/opt/ocr/bin/tesseract",
            "--pdftoppm-cmd",
            "/opt/poppler/bin/pdftoppm",
        ]);
        let pdf = args.extract.pdf_config();

        assert_eq!(pdf.tesseract_cmd, PathBuf::from("/opt/ocr/bin/tesseract"));
        assert_eq!(pdf.pdftoppm_cmd, PathBuf::from("/opt/poppler/bin/pdftoppm"));
    }

    #[test]
    fn test_defaults_match_library_defaults() {
        let args = extract_args(&[]);
        let config = args.crawler.config().unwrap();
        let defaults = CrawlerConfig::default();

        assert_eq!(config.robots_timeout, defaults.robots_timeout);
        assert_eq!(config.render_timeout, defaults.render_timeout);
        assert_eq!(args.extract.pdf_config().tesseract_cmd, PdfExtractConfig::default().tesseract_cmd);
    }
}
