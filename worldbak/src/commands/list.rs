use std::path::Path;

use anyhow::Context;
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;

use super::load_config;
use crate::artifact::backup_offset;
use crate::catalog::list_backups;
use crate::store;

pub async fn list(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = store::from_config(&config).await;
    let catalog = list_backups(store.as_ref(), &config.s3_bucket)
        .await
        .context("Failed to list backups")?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["world", "key", "last modified", "configured"]);

    catalog.iter().for_each(|(world, artifact)| {
        let configured = config.worlds.iter().any(|w| w == world);
        table.add_row(vec![
            world.to_string(),
            artifact.key.clone(),
            artifact
                .last_modified
                .with_timezone(&backup_offset())
                .format("%Y/%m/%d %H:%M:%S")
                .to_string(),
            if configured { "yes" } else { "no" }.to_string(),
        ]);
    });

    println!("{table}");
    Ok(())
}
