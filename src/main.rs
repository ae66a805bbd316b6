use anyhow::Result;
use clap::Parser;

mod cli;

use cli::commands::dispatch::DispatchCommand;
use cli::commands::init::InitCommand;
use cli::commands::start::StartCommand;
use cli::commands::status::StatusCommand;
use cli::commands::tick::TickCommand;
use cli::commands::RolloutContext;
use cli::{Cli, Commands};
use ring_rollout::{init_telemetry, RolloutSettings};

fn main() -> Result<()> {
    let cli = Cli::parse();
    RolloutSettings::load_env_file()?;

    let Some(command) = cli.command else {
        show_usage();
        return Ok(());
    };

    // Init runs before any settings file exists.
    if let Commands::Init {
        force,
        labels,
        dry_run,
    } = command
    {
        init_telemetry(&RolloutSettings::default().observability)?;
        return tokio::runtime::Runtime::new()?.block_on(async {
            InitCommand::new(cli.config, force, labels, dry_run)
                .execute()
                .await
        });
    }

    let context = RolloutContext::load(cli.config.as_deref(), cli.no_publish)?;
    init_telemetry(&context.settings.observability)?;

    tokio::runtime::Runtime::new()?.block_on(async {
        match command {
            Commands::Start { version } => StartCommand::new(version).execute(&context).await,
            Commands::Tick => TickCommand.execute(&context).await,
            Commands::Status => StatusCommand.execute(&context).await,
            Commands::Dispatch => DispatchCommand.execute(&context).await,
            Commands::Init { .. } => Ok(()),
        }
    })
}

fn show_usage() {
    println!("🎯 ring-rollout - progressive ring-based rollouts");
    println!();
    println!("Typical workflow:");
    println!("  ⚙️  ring-rollout init                  # Write a starter ring-rollout.toml");
    println!("  🚀 ring-rollout start --version <rev>  # Snapshot ring 0 for a new revision");
    println!("  ⏩ ring-rollout tick                   # Promote rings that are due");
    println!("  📊 ring-rollout status                 # Show active rollouts");
    println!();
    println!("In GitHub Actions, 'ring-rollout dispatch' picks start or tick from the event.");
}
