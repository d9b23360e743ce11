use std::path::Path;

use anyhow::Context;

use super::load_config;
use crate::archive::ZipArchiver;
use crate::args::RunArgs;
use crate::orchestrator::{self, BackupAction, RunContext};
use crate::{notify, store};

pub async fn run(config_path: &Path, args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let plan = config.plan();
    let store = store::from_config(&config).await;
    let notifier = notify::from_config(&config);
    let archiver = ZipArchiver::default();

    let ctx = RunContext {
        store: store.as_ref(),
        archiver: &archiver,
        notifier: notifier.as_ref(),
        dry_run: args.dry_run,
    };
    let report = orchestrator::run(&ctx, &plan)
        .await
        .with_context(|| format!("Backup run against bucket {} aborted", plan.bucket))?;

    for world in &report.worlds {
        let action = match &world.action {
            BackupAction::UpToDate => "up to date".to_string(),
            BackupAction::BackedUp { key } => format!("backed up as {key}"),
            BackupAction::Planned => "would be backed up".to_string(),
            BackupAction::Failed => "failed".to_string(),
        };
        println!(
            "{}: {action}, {} old backups {}",
            world.world,
            world.pruned.len(),
            if args.dry_run { "to delete" } else { "deleted" }
        );
    }
    Ok(())
}
