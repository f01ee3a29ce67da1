//! Courseware TUI: interactive course outline, download queue and course
//! search, built with `ratatui` + `crossterm`.

mod app;
mod router;
mod screens;
mod widgets;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use color_eyre::eyre::Result;
use courseware_shared::config_dir;

/// Interactive courseware browser.
#[derive(Parser)]
#[command(name = "courseware-tui", version, long_about = None)]
struct Args {
    /// Course JSON file to browse.
    course: PathBuf,

    /// Block to open the outline at (defaults to the course root).
    #[arg(short, long)]
    block: Option<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging()?;

    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();
    app::run(&args.course, args.block.as_deref())
}

/// Log to `~/.courseware/courseware-tui.log`; the terminal belongs to the UI.
fn init_logging() -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("courseware-tui.log"))?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("courseware=info,analytics=info"));

    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
