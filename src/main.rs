use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use usher::config::UsherConfig;
use usher::dom::parser::parse_html;
use usher::dom::DomTree;
use usher::engine::background::Background;
use usher::engine::host::Tabs;
use usher::engine::message::BackgroundMessage;
use usher::engine::pipeline::{Outcome, Pipeline};
use usher::error::{Result, UsherError};
use usher::net::cache::CacheStore;
use usher::net::fetch::{fetch_page, normalize_url};
use usher::net::store::{self, JsonFileStore};
use usher::net::summarize::HttpSummarizer;
use usher::page::classify::{read_override, toggle_visible, write_override, HoverPreference};
use usher::page::storage::{self, FileLocalStorage};
use usher::page::{AgentDeps, PageEvent};
use usher::render::placement::Viewport;
use usher::render::SurfaceEvent;

#[derive(Parser, Debug)]
#[command(name = "usher", about = "Link summaries from the page you are reading", version)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the summary cache and per-site overrides.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log state transitions and cache activity.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a link as if it were right-clicked on the page.
    Summarize {
        /// Link address, absolute or relative to the page.
        link: String,
        /// Page the link appears on.
        #[arg(long)]
        page: String,
        /// Read the page from a local file instead of fetching it.
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Show whether hover summaries would be enabled on a page.
    Classify {
        #[arg(long)]
        page: String,
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Set or clear the hover override for a site.
    Override { host: String, state: OverrideState },
    /// Inspect or empty the summary cache.
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OverrideState {
    On,
    Off,
    Clear,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    Stats,
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("usher: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => UsherConfig::load(path)?,
        None => UsherConfig::default(),
    };
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

    match cli.command {
        Command::Summarize { link, page, html } => {
            summarize(config, &data_dir, &link, &page, html.as_deref()).await
        }
        Command::Classify { page, html } => classify(&data_dir, &page, html.as_deref()).await,
        Command::Override { host, state } => {
            let storage = FileLocalStorage::open(data_dir.join("overrides.json"))?;
            let value = match state {
                OverrideState::On => Some(true),
                OverrideState::Off => Some(false),
                OverrideState::Clear => None,
            };
            write_override(&storage, &host, value);
            println!("{}: override {:?}", host, read_override(&storage, &host));
            Ok(())
        }
        Command::Cache(cmd) => {
            let store = JsonFileStore::open(data_dir.join("cache.json")).await?;
            let cache = CacheStore::new(Arc::new(store), config.cache);
            match cmd {
                CacheCommand::Stats => {
                    let stats = cache.stats().await?;
                    println!("{} entries ({} expired)", stats.entries, stats.expired);
                }
                CacheCommand::Clear => {
                    let removed = cache.clear().await?;
                    println!("Removed {} entries", removed);
                }
            }
            Ok(())
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs_next::data_dir()
        .map(|d| d.join("usher"))
        .unwrap_or_else(|| PathBuf::from(".usher"))
}

async fn load_document(page: &str, html: Option<&Path>) -> Result<DomTree> {
    match html {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| UsherError::Page(format!("{}: {}", path.display(), e)))?;
            Ok(parse_html(&raw, normalize_url(page)?.as_str()))
        }
        None => {
            let fetched = fetch_page(page).await?;
            if !(200..300).contains(&fetched.status) {
                log::warn!("{} answered HTTP {}", fetched.url, fetched.status);
            }
            Ok(parse_html(&fetched.html, &fetched.url))
        }
    }
}

async fn classify(data_dir: &Path, page: &str, html: Option<&Path>) -> Result<()> {
    let doc = load_document(page, html).await?;
    let storage = storage::open_or_memory(data_dir.join("overrides.json"));
    let preference = HoverPreference::load(&doc, storage);
    let c = preference.classification();

    println!("host:           {}", doc.hostname());
    println!("content-rich:   {}", c.auto_detected);
    println!("override:       {:?}", c.override_enabled);
    println!("hover enabled:  {}", c.enabled());
    println!("toggle visible: {}", toggle_visible(&doc.path()));
    Ok(())
}

async fn summarize(
    config: UsherConfig,
    data_dir: &Path,
    link: &str,
    page: &str,
    html: Option<&Path>,
) -> Result<()> {
    let doc = load_document(page, html).await?;
    let target = doc
        .resolve_href(link)
        .ok_or_else(|| UsherError::Page(format!("cannot resolve {} against {}", link, doc.url)))?;
    let anchor = doc
        .links()
        .into_iter()
        .find(|(_, address)| *address == target)
        .map(|(path, _)| path);
    if anchor.is_none() {
        log::warn!("{} does not appear on the page; summarizing without context", target);
    }

    let config = Arc::new(config);
    let (bg_tx, _bg_rx) = mpsc::channel(16);
    let (surface_tx, mut surface_rx) = mpsc::unbounded_channel();
    let storage = storage::open_or_memory(data_dir.join("overrides.json"));
    let tabs = Arc::new(Tabs::new(AgentDeps {
        background: bg_tx,
        surface: surface_tx,
        storage,
        config: config.clone(),
    }));

    let store = store::open_or_memory(data_dir.join("cache.json")).await;
    let cache = CacheStore::new(store, config.cache.clone());
    let summarizer = Arc::new(HttpSummarizer::new(&config.endpoint)?);
    let background = Background::new(Pipeline::new(
        tabs.clone(),
        cache,
        summarizer,
        config.pipeline.clone(),
    ));

    let tab = tabs.open_with_agent(doc, Viewport::default()).await?;
    if let Some(target) = anchor {
        tabs.dispatch(tab, PageEvent::ContextMenu { target }).await?;
    }

    let job = background.handle(BackgroundMessage::ContextMenuClicked {
        link_url: Some(target),
        selection_text: None,
        tab,
    });
    let Some(job) = job else {
        return Ok(());
    };
    let outcome = job
        .await
        .map_err(|e| UsherError::Page(format!("summarize task failed: {}", e)))?;

    while let Ok(update) = surface_rx.try_recv() {
        if let SurfaceEvent::PopupShown { placement, .. } | SurfaceEvent::PopupMoved { placement, .. } =
            &update.event
        {
            log::debug!(
                "popup at ({:.0}, {:.0}) {:?}",
                placement.left,
                placement.top,
                placement.direction
            );
        }
    }
    tabs.close(tab);

    match outcome {
        Outcome::Delivered {
            summary,
            from_cache,
            ..
        } => {
            if from_cache {
                log::info!("Served from cache");
            }
            println!("{}", summary);
            Ok(())
        }
        Outcome::Failed { error, .. } => Err(error),
    }
}
