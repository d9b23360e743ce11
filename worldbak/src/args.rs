use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "worldbak",
    about = "Back up world directories to an object store and prune old generations"
)]
pub struct Cli {
    /// Configuration file (.json or .toml), defaults to worldbak.conf.json
    /// next to the executable
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Turn verbose logging on
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Back up changed worlds and prune old backups
    Run(RunArgs),
    /// List the backups in the bucket
    List,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Decide what would be uploaded and deleted without touching the store
    #[arg(long)]
    pub dry_run: bool,
}
