//! One backup run over every configured world.
//!
//! Worlds are processed strictly in configuration order. The catalog is
//! built once and threaded through each world by reference, so a backup
//! made for a world is visible to that world's pruning. Only a failed
//! listing ends the run; every other failure is reported and the next world
//! is attempted.

use chrono::Utc;
use tracing::Instrument;

use crate::archive::Archiver;
use crate::catalog::{Catalog, list_backups};
use crate::config::BackupPlan;
use crate::error::BackupError;
use crate::executor::backup_world;
use crate::notify::{FAILURE_TITLE, Notifier};
use crate::pruner::{prune_old_backups, select_expired};
use crate::staleness::is_up_to_date;
use crate::store::ObjectStore;

/// Collaborators of a run.
pub struct RunContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub archiver: &'a dyn Archiver,
    pub notifier: &'a dyn Notifier,
    /// Decide and select, but never upload or delete.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupAction {
    /// An existing backup is at least as new as the world.
    UpToDate,
    BackedUp { key: String },
    /// Dry run: a backup would have been made.
    Planned,
    Failed,
}

#[derive(Debug)]
pub struct WorldReport {
    pub world: String,
    pub action: BackupAction,
    /// Keys deleted by pruning, or selected for deletion in a dry run.
    pub pruned: Vec<String>,
    pub errors: Vec<BackupError>,
}

impl WorldReport {
    fn new(world: &str) -> Self {
        Self {
            world: world.to_string(),
            action: BackupAction::Failed,
            pruned: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub worlds: Vec<WorldReport>,
}

impl RunReport {
    pub fn world(&self, name: &str) -> Option<&WorldReport> {
        self.worlds.iter().find(|w| w.world == name)
    }

    pub fn failure_count(&self) -> usize {
        self.worlds.iter().map(|w| w.errors.len()).sum()
    }

    pub fn backed_up(&self) -> usize {
        self.worlds
            .iter()
            .filter(|w| matches!(w.action, BackupAction::BackedUp { .. }))
            .count()
    }
}

fn report_failure(notifier: &dyn Notifier, err: &BackupError) {
    tracing::error!("{err}");
    notifier.notify(FAILURE_TITLE, &err.summary());
}

/// Run the backup over all worlds of `plan`.
///
/// Returns an error only when the catalog cannot be built; per-world
/// failures end up in the report.
pub async fn run(ctx: &RunContext<'_>, plan: &BackupPlan) -> Result<RunReport, BackupError> {
    let mut catalog = match list_backups(ctx.store, &plan.bucket).await {
        Ok(catalog) => catalog,
        Err(err) => {
            report_failure(ctx.notifier, &err);
            return Err(err);
        }
    };

    let mut report = RunReport::default();
    for world in &plan.worlds {
        let world_report = process_world(ctx, plan, &mut catalog, world)
            .instrument(tracing::info_span!("world", world = %world))
            .await;
        for err in &world_report.errors {
            report_failure(ctx.notifier, err);
        }
        report.worlds.push(world_report);
    }

    tracing::info!(
        "Run finished: {} worlds, {} backed up, {} failures",
        report.worlds.len(),
        report.backed_up(),
        report.failure_count()
    );
    Ok(report)
}

async fn process_world(
    ctx: &RunContext<'_>,
    plan: &BackupPlan,
    catalog: &mut Catalog,
    world: &str,
) -> WorldReport {
    tracing::info!("backup {world}");
    let mut report = WorldReport::new(world);

    let up_to_date = match is_up_to_date(catalog, &plan.source_root, world) {
        Ok(up_to_date) => up_to_date,
        Err(err) => {
            // without readable world data neither backup nor pruning is safe
            report.errors.push(err);
            return report;
        }
    };

    if up_to_date {
        tracing::info!("{world} is already backed up");
        report.action = BackupAction::UpToDate;
    } else if ctx.dry_run {
        tracing::info!("Would back up {world}");
        report.action = BackupAction::Planned;
    } else {
        let result = backup_world(
            ctx.store,
            &plan.bucket,
            ctx.archiver,
            &plan.source_root,
            world,
            Utc::now(),
        )
        .await;
        match result {
            Ok(artifact) => {
                report.action = BackupAction::BackedUp {
                    key: artifact.key.clone(),
                };
                catalog.insert(artifact);
            }
            Err(err @ BackupError::LocalAccess { .. }) => {
                report.errors.push(err);
                return report;
            }
            // an upload failure still prunes what is already stored
            Err(err) => report.errors.push(err),
        }
    }

    if ctx.dry_run {
        // the planned backup would take one of the kept slots
        let keep = match report.action {
            BackupAction::Planned => plan.generation.saturating_sub(1),
            _ => plan.generation,
        };
        for artifact in select_expired(catalog.artifacts(world), world, keep) {
            tracing::info!("Would delete old backup {}", artifact.key);
            report.pruned.push(artifact.key.clone());
        }
        return report;
    }

    let outcome =
        prune_old_backups(ctx.store, &plan.bucket, catalog, world, plan.generation).await;
    for key in &outcome.deleted {
        catalog.remove(world, key);
    }
    report.pruned = outcome.deleted;
    report.errors.extend(outcome.failures);
    report
}
