use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "ring-rollout")]
#[command(version)]
#[command(about = "Progressive ring-based rollout of repository artifacts")]
#[command(long_about = "ring-rollout promotes a changed artifact set through an ordered sequence of \
                       deployment rings, gated on dwell time, operator labels and an optional \
                       validation command. Run 'ring-rollout start' when a revision lands and \
                       'ring-rollout tick' on a schedule.")]
pub struct Cli {
    /// Settings file (defaults to ring-rollout.toml in the working directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Leave changed ring directories uncommitted
    #[arg(long, global = true)]
    pub no_publish: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start rolling out a source revision: snapshot ring 0 for every ring set
    Start {
        /// Revision being rolled out (commit SHA, tag, build id)
        #[arg(long, help = "Source version stamped into every ring snapshot")]
        version: String,
    },
    /// Evaluate every active rollout once and promote rings that are due
    Tick,
    /// Show active rollouts and their progress
    Status,
    /// Act on the GitHub Actions event that triggered this run
    Dispatch,
    /// Write a starter ring-rollout.toml
    Init {
        /// Overwrite an existing settings file
        #[arg(long, help = "Overwrite an existing ring-rollout.toml")]
        force: bool,
        /// Create the control labels in the GitHub repository
        #[arg(long, help = "Create rollout control labels on GitHub")]
        labels: bool,
        /// Show what would be created without making changes
        #[arg(long, help = "Show what would be created without making changes")]
        dry_run: bool,
    },
}
