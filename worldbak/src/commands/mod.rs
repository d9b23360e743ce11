pub mod list;
pub mod run;

pub use list::list;
pub use run::run;

use std::path::Path;

use anyhow::Context;

use crate::config::Config;
use crate::notify::{FAILURE_TITLE, LogNotifier, Notifier};

/// Load the configuration; a failure is reported like any other, then ends
/// the process.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path)
        .inspect_err(|err| {
            tracing::error!("{err}");
            LogNotifier.notify(FAILURE_TITLE, &err.summary());
        })
        .with_context(|| format!("Failed to load config {}", path.display()))
}
