use anyhow::Result;
use clap::Parser;
use crawler::{run_crawl, CrawlOptions, HttpFetcher};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use trawl_core::{DataPaths, Frontier, InvertedIndex};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl the web from a seed url and index the pages")]
struct Cli {
    /// Resume from the frontier and index snapshots in the data directory
    #[arg(short, long, default_value_t = false)]
    restart: bool,
    /// Url to start from, e.g. http://myseedurl.org (required unless restarting)
    #[arg(short, long)]
    seed: Option<String>,
    /// Directory holding index.json and crawler.json
    #[arg(long, default_value = ".")]
    data_dir: String,
    /// Maximum number of pages to index in this session
    #[arg(long, default_value_t = 1000)]
    max_pages: usize,
    /// Concurrent fetches
    #[arg(long, default_value_t = 8)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// User-Agent string sent with every request
    #[arg(long, default_value = "trawl-bot/0.1 (+https://example.com/bot)")]
    user_agent: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();
    let paths = DataPaths::new(&args.data_dir);

    let mut frontier = Frontier::new(args.restart, args.seed.as_deref(), paths.frontier())?;
    let index = InvertedIndex::open(args.restart, paths.index())?.into_shared();
    let fetcher = HttpFetcher::new(&args.user_agent, Duration::from_secs(args.timeout_secs))?;
    tracing::info!(
        restart = args.restart,
        seed = ?args.seed,
        max_pages = args.max_pages,
        concurrency = args.concurrency,
        data_dir = %args.data_dir,
        "starting crawl"
    );

    let options = CrawlOptions { max_pages: args.max_pages, concurrency: args.concurrency };
    let report = run_crawl(&mut frontier, &index, fetcher, &options).await;

    {
        let index = index.read();
        match index.dump() {
            Ok(()) => tracing::info!(path = ?index.snapshot_path(), "index snapshot written"),
            Err(err) => tracing::warn!(error = %err, "index snapshot not written"),
        }
    }
    tracing::info!(
        indexed = report.indexed,
        skipped = report.skipped,
        urls = index.read().indexed_url_count(),
        pending = frontier.to_crawl_len(),
        frontier_snapshot = %frontier.snapshot_path().display(),
        "crawl done"
    );
    Ok(())
}
