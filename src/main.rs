use clap::{Parser, Subcommand};
use anyhow::Result;
use dotenvy::dotenv;

mod bot;
mod meeting;
mod output;
mod periodic;
mod settings;
mod shorten;
mod telemetry;
mod util;

use telemetry::ops::settings::Phase as SettingsPhase;

#[derive(Parser)]
#[command(name = "oslobot", about = "Periodic job health and meeting notes for OpenStack teams")]
struct Cli {
    /// Emit a single JSON envelope to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report recent periodic job failures per project and python version
    Check(periodic::CheckCmd),
    /// Find the latest meeting minutes of a team
    Meeting(meeting::MeetingCmd),
    /// Run as a bot: report to the configured rooms on a schedule
    Watch(bot::WatchCmd),
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and OSLOBOT_LOG_FORMAT
    telemetry::config::init_tracing();

    let settings = {
        let _s = telemetry::settings().span(&SettingsPhase::Load).entered();
        settings::Settings::from_env()?
    };

    match cli.command {
        Commands::Check(args) => periodic::run(&settings, args).await?,
        Commands::Meeting(args) => meeting::run(&settings, args).await?,
        Commands::Watch(args) => bot::run_watch(&settings, args).await?,
        Commands::Config => settings::show(&settings)?,
    }

    Ok(())
}
