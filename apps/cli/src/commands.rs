//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use courseware_core::{
    CourseQuerier, DownloadOutcome, JsonCourseQuerier, MemoryLastAccessedStore, NO_WIFI_MESSAGE,
    OutlineEnvironment, OutlineScreenController, OutlineView, QueuedDownloads, Router, ScreenKind,
    TracingAnalytics,
};
use courseware_search::{ExternalBrowser, HttpSurface, WebSearchHelper, build_query};
use courseware_shared::{
    AppConfig, BlockId, BlockType, LoadState, init_config, load_config,
};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Courseware: browse course outlines and search the course catalog.
#[derive(Parser)]
#[command(
    name = "courseware",
    version,
    about = "Browse course outlines, queue video downloads and search the course catalog.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Print the outline of a course (or of one section of it).
    Outline {
        /// Course JSON file.
        course: PathBuf,

        /// Block to root the outline at (defaults to the course root).
        #[arg(short, long)]
        block: Option<String>,

        /// Reload the course file once before printing.
        #[arg(long)]
        refresh: bool,
    },

    /// Queue the videos of a block for download.
    Download {
        /// Course JSON file.
        course: PathBuf,

        /// A video block, or a section whose video children are queued.
        block: String,
    },

    /// Print the catalog search URL for some search terms.
    SearchUrl {
        /// Search terms.
        #[arg(required = true, num_args = 1..)]
        terms: Vec<String>,

        /// Search base URL (defaults to `search.base_url` from the config).
        #[arg(long)]
        base: Option<Url>,
    },

    /// Fetch the catalog search page for some search terms.
    Search {
        /// Search terms.
        #[arg(required = true, num_args = 1..)]
        terms: Vec<String>,

        /// Search base URL (defaults to `search.base_url` from the config).
        #[arg(long)]
        base: Option<Url>,
    },

    /// Print the course info URL for a course path id.
    CourseInfo {
        /// Course path id substituted into the URL template.
        path_id: String,
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "courseware=info",
        1 => "courseware=debug",
        _ => "courseware=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{filter},analytics=info")));

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
    match cli.command {
        Command::Outline {
            course,
            block,
            refresh,
        } => cmd_outline(&course, block.as_deref(), refresh).await,
        Command::Download { course, block } => cmd_download(&course, &block).await,
        Command::SearchUrl { terms, base } => cmd_search_url(&terms, base).await,
        Command::Search { terms, base } => cmd_search(&terms, base).await,
        Command::CourseInfo { path_id } => cmd_course_info(&path_id).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Headless collaborators
// ---------------------------------------------------------------------------

/// Navigation has nowhere to go in a one-shot command; it is only logged.
struct LogRouter;

impl Router for LogRouter {
    fn navigate_to_container(
        &self,
        block_id: &BlockId,
        block_type: BlockType,
        parent_id: &BlockId,
        course_id: &str,
        from: ScreenKind,
    ) {
        info!(%block_id, %block_type, %parent_id, course_id, ?from, "navigate to container");
    }

    fn navigate_to_downloads(&self, from: ScreenKind) {
        info!(?from, "navigate to downloads");
    }
}

/// Links that would leave the search page are printed instead of opened.
struct PrintBrowser;

impl ExternalBrowser for PrintBrowser {
    fn open(&self, url: &Url) {
        println!("open in browser: {url}");
    }
}

fn outline_env(course: &Path, config: &AppConfig) -> Result<(OutlineEnvironment, Arc<QueuedDownloads>)> {
    let querier: Arc<dyn CourseQuerier> = Arc::new(JsonCourseQuerier::open(course)?);
    let downloads = Arc::new(QueuedDownloads::new());
    let network = Arc::new(config.downloads.clone());

    let env = OutlineEnvironment {
        querier,
        analytics: Arc::new(TracingAnalytics),
        router: Arc::new(LogRouter),
        downloads: downloads.clone(),
        reachability: network.clone(),
        preferences: network,
        last_accessed: Arc::new(MemoryLastAccessedStore::new()),
    };
    Ok((env, downloads))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_outline(course: &Path, block: Option<&str>, refresh: bool) -> Result<()> {
    let config = load_config()?;
    let (env, _downloads) = outline_env(course, &config)?;

    let controller = OutlineScreenController::new(env, block.map(BlockId::from));
    controller.start();
    controller.idle().await;
    if refresh {
        controller.refresh();
        controller.idle().await;
    }
    controller.view_will_appear().await;

    let view = controller.view();
    print_outline(&view);
    match view.load_state {
        LoadState::Failed { message, .. } => Err(eyre!(message)),
        _ => Ok(()),
    }
}

fn print_outline(view: &OutlineView) {
    if let Some(title) = &view.title {
        println!("{title}");
        println!("{}", "=".repeat(title.chars().count()));
    }

    match &view.load_state {
        LoadState::Empty { message, .. } => println!("{message}"),
        LoadState::Failed { message, .. } => println!("failed to load outline: {message}"),
        _ => {}
    }

    for group in &view.groups {
        println!("{} ({}) [{}]", group.block.display_name, group.block.block_type, group.block.id);
        for row in &group.children {
            let marker = if view.highlighted.as_ref() == Some(&row.id) { ">" } else { " " };
            println!("  {marker} {} ({}) [{}]", row.display_name, row.block_type, row.id);
        }
    }
}

async fn cmd_download(course: &Path, block: &str) -> Result<()> {
    let config = load_config()?;
    let (env, downloads) = outline_env(course, &config)?;
    let querier = Arc::clone(&env.querier);
    let controller = OutlineScreenController::new(env, None);

    let id = BlockId::from(block);
    let target = querier.block(&id).await?;
    let outcome = if target.block_type == BlockType::Video {
        controller.download_video(&target)
    } else {
        let videos = querier.children_of(Some(&id)).await?.videos();
        if videos.is_empty() {
            println!("{} has no videos", target.display_name);
            return Ok(());
        }
        controller.download_videos(&videos, &target).await
    };

    match outcome {
        DownloadOutcome::Blocked => Err(eyre!(NO_WIFI_MESSAGE)),
        DownloadOutcome::Enqueued => {
            for video in downloads.queued() {
                match &video.video_url {
                    Some(url) => println!("queued {} ({url})", video.block_id),
                    None => println!("queued {}", video.block_id),
                }
            }
            Ok(())
        }
    }
}

fn search_base(base: Option<Url>, config: &AppConfig) -> Result<Url> {
    base.or_else(|| config.search.base_url.clone())
        .ok_or_else(|| eyre!("no search base URL: pass --base or set search.base_url in the config"))
}

async fn cmd_search_url(terms: &[String], base: Option<Url>) -> Result<()> {
    let config = load_config()?;
    let base = search_base(base, &config)?;
    let url = build_query(base.as_str(), &terms.join(" "))?;
    println!("{url}");
    Ok(())
}

async fn cmd_search(terms: &[String], base: Option<Url>) -> Result<()> {
    let config = load_config()?;
    let base = search_base(base, &config)?;

    let helper = WebSearchHelper::new(config, Arc::new(HttpSurface::new()?), Arc::new(PrintBrowser));
    helper.set_search_base_url(Some(base));
    helper.search_submitted(&terms.join(" "))?.await?;

    match helper.load_state() {
        LoadState::Failed { message, .. } => Err(eyre!("search failed: {message}")),
        _ => {
            if let Some(page) = helper.page() {
                println!("{} {}", page.status, page.url);
                if let Some(title) = page.title {
                    println!("{title}");
                }
                println!("{} bytes", page.body_len);
            }
            Ok(())
        }
    }
}

async fn cmd_course_info(path_id: &str) -> Result<()> {
    let config = load_config()?;
    let helper = WebSearchHelper::new(config, Arc::new(HttpSurface::new()?), Arc::new(PrintBrowser));
    println!("{}", helper.course_info_url(path_id)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
