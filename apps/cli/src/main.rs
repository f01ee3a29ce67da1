//! Courseware CLI: headless course outline browsing and course search.
//!
//! Loads a course tree from JSON, prints outlines, queues video downloads and
//! builds or fetches find-courses search pages.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
