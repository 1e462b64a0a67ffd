//! Tagwalk main entry point
//!
//! Command-line interface for the randomized link-walking crawler.

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tagwalk::browser::{HeadlessSession, RenderSession};
use tagwalk::config::{load_store_with_hash, CrawlConfig, Store, TimingProfile};
use tagwalk::crawler::Controller;
use tagwalk::output::{print_summary, write_report};
use tracing_subscriber::EnvFilter;

/// Tagwalk: a randomized link-walking crawler
///
/// Tagwalk wanders a website's link graph at random, optionally running
/// configured form-fill/click actions on matching pages, and can
/// periodically reset browser session state. Built for marketing-tag
/// verification and exploratory crawling.
#[derive(Parser, Debug)]
#[command(name = "tagwalk")]
#[command(version = "1.0.0")]
#[command(about = "A randomized link-walking crawler", long_about = None)]
struct Cli {
    /// URL the walk starts from
    #[arg(value_name = "START_URL")]
    start_url: String,

    /// Maximum number of crawl steps
    #[arg(long, default_value_t = 10)]
    steps: u64,

    /// Delay between steps, in seconds
    #[arg(long, default_value_t = 2.0)]
    delay: f64,

    /// Allow the walk to leave the start URL's domain
    #[arg(long)]
    any_domain: bool,

    /// Maximum number of links kept per page
    #[arg(long, default_value_t = 50)]
    max_links: usize,

    /// Path to the JSON configuration store
    #[arg(long, default_value = "crawler_config.json")]
    store: PathBuf,

    /// Crawl over plain HTTP only, without the browser
    #[arg(long)]
    no_browser: bool,

    /// Enable session restarts with the given step interval,
    /// e.g. "10-20" for a random interval or "15" for a fixed one
    #[arg(long, value_name = "RANGE")]
    restart: Option<String>,

    /// Use the slower, more thorough tag-detection profile
    #[arg(long)]
    safe_mode: bool,

    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,

    /// Skip cookie logging
    #[arg(long)]
    no_cookie_log: bool,

    /// Fixed RNG seed for reproducible walks
    #[arg(long)]
    seed: Option<u64>,

    /// Write a plain-text report to this path after the run
    #[arg(long)]
    report: Option<PathBuf>,

    /// Validate the store and show the run setup without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            start_url: self.start_url.clone(),
            max_steps: self.steps,
            delay_secs: self.delay,
            stay_in_domain: !self.any_domain,
            max_links_per_page: self.max_links,
            use_browser: !self.no_browser,
            restart_enabled: self.restart.is_some(),
            restart_range: self.restart.clone().unwrap_or_else(|| "10-20".to_string()),
            profile: if self.safe_mode {
                TimingProfile::Safe
            } else {
                TimingProfile::Fast
            },
            headless: !self.headed,
            log_cookies: !self.no_cookie_log,
            seed: self.seed,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration store from: {}", cli.store.display());
    let (store, store_hash) = match load_store_with_hash(&cli.store) {
        Ok((store, hash)) => {
            tracing::info!("Configuration store loaded (hash: {})", hash);
            (store, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration store: {}", e);
            return Err(e.into());
        }
    };

    let config = cli.crawl_config();

    if cli.dry_run {
        handle_dry_run(&config, &store, &store_hash);
        return Ok(());
    }

    handle_crawl(config, store, cli.report.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tagwalk=info,warn"),
            1 => EnvFilter::new("tagwalk=debug,info"),
            2 => EnvFilter::new("tagwalk=trace,debug"),
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

/// Handles --dry-run: shows what the run would do without crawling
fn handle_dry_run(config: &CrawlConfig, store: &Store, store_hash: &str) {
    println!("=== Tagwalk Dry Run ===\n");

    println!("Run Parameters:");
    println!("  Start URL: {}", config.start_url);
    println!("  Max steps: {}", config.max_steps);
    println!("  Step delay: {}s", config.delay_secs);
    println!("  Domain lock: {}", config.stay_in_domain);
    println!("  Link cap per page: {}", config.max_links_per_page);
    println!("  Browser: {}", config.use_browser);
    println!("  Timing profile: {:?}", config.profile);
    if config.restart_enabled {
        println!("  Restarts: enabled ({})", config.restart_range);
    } else {
        println!("  Restarts: disabled");
    }

    println!("\nStore (hash {}):", store_hash);

    let enabled_rules: Vec<_> = store.rules.iter().filter(|r| r.enabled).collect();
    println!("  Exclusion rules ({} enabled):", enabled_rules.len());
    for rule in enabled_rules {
        println!("    - [{:?}] {}: {}", rule.kind, rule.pattern, rule.description);
    }

    let enabled_actions: Vec<_> = store.actions.iter().filter(|a| a.enabled).collect();
    println!("  Actions ({} enabled):", enabled_actions.len());
    for action in enabled_actions {
        println!(
            "    - {} (trigger '{}', {} inputs)",
            action.name,
            action.trigger,
            action.inputs.len()
        );
    }

    println!("  Word lists: {}", store.word_lists.len());

    println!("\n✓ Configuration store is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: CrawlConfig,
    store: Store,
    report_path: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let engine: Option<Arc<dyn RenderSession>> = if config.use_browser {
        let headless = config.headless;
        match tokio::task::spawn_blocking(move || HeadlessSession::launch(headless)).await? {
            Ok(session) => Some(Arc::new(session)),
            Err(e) => {
                tracing::warn!("Browser unavailable, continuing over plain HTTP: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut controller = Controller::new(config.clone(), store, engine)?;

    // An interrupt stops the loop between steps; in-flight waits finish
    // or time out on their own
    let shutdown = controller.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing the current step");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    controller.run().await?;

    print_summary(
        &config,
        controller.ledger(),
        controller.visited_count(),
        controller.restart_count(),
    );

    if let Some(path) = report_path {
        write_report(
            path,
            &config,
            controller.ledger(),
            controller.visited_count(),
            controller.restart_count(),
        )?;
        println!("\nReport written to: {}", path.display());
    }

    Ok(())
}
