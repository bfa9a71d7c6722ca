use crate::prelude::*;
use clap::Parser;

mod config;
mod error;
mod extract;
mod input;
mod lines;
mod prelude;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Rebuild paragraph-level text blocks from PDF documents"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// TOML file with reconstruction options
    #[clap(long, env = "REFLOW_CONFIG", global = true)]
    config: Option<std::path::PathBuf>,

    /// Stop after this many pages
    #[clap(long, env = "REFLOW_MAX_PAGES", global = true)]
    max_pages: Option<usize>,

    /// Whether to display additional information.
    #[clap(long, env = "REFLOW_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Extract paragraph text blocks
    Extract(crate::extract::App),

    /// Show merged lines with their header/footer marks
    Lines(crate::lines::App),

    /// Print the effective configuration as TOML
    Config(crate::config::App),
}

#[tokio::main]
async fn main() -> Result<()> {
    let app = App::parse();

    let default_filter = if app.global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    color_eyre::install()?;

    match app.command {
        SubCommands::Extract(sub_app) => crate::extract::run(sub_app, app.global).await,
        SubCommands::Lines(sub_app) => crate::lines::run(sub_app, app.global).await,
        SubCommands::Config(sub_app) => crate::config::run(sub_app, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
