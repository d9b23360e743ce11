//! Run configuration.
//!
//! JSON files use the legacy field names, so an existing
//! config such as
//!
//! ```json
//! {
//!     "aws_access_key_id": "*******",
//!     "aws_secret_access_key": "******",
//!     "region_name": "ap-northeast-1",
//!     "world_data_path": "/srv/minecraftWorlds",
//!     "worlds": ["EvzZZWjpAgA=", "oMCHZhjmAAA="],
//!     "s3_backet": "aks3-minecraft",
//!     "n_backup_generation": "3"
//! }
//! ```
//!
//! loads unchanged. Files ending in `.toml` are read with `confy`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::BackupError;

pub const DEFAULT_CONFIG_NAME: &str = "worldbak.conf.json";
const DEFAULT_MAX_RETRIES: u32 = 3;
const MAX_RETRIES: u32 = 10;

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    S3,
    Local,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    pub world_data_path: PathBuf,
    pub worlds: Vec<String>,
    #[serde(alias = "s3_backet")]
    pub s3_bucket: String,
    #[serde(deserialize_with = "deserialize_generation")]
    pub n_backup_generation: usize,
    #[serde(default)]
    pub backend: Backend,
    /// Defaults to `.worldbak` under `world_data_path`.
    #[serde(default)]
    pub local_root: Option<PathBuf>,
    /// Program and leading arguments; title and message are appended.
    #[serde(default)]
    pub notify_command: Vec<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws_access_key_id: None,
            aws_secret_access_key: None,
            region_name: None,
            endpoint_url: None,
            world_data_path: PathBuf::new(),
            worlds: Vec::new(),
            s3_bucket: String::new(),
            n_backup_generation: 0,
            backend: Backend::default(),
            local_root: None,
            notify_command: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Older config files write the generation count as a string.
fn deserialize_generation<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Generation {
        Number(usize),
        Text(String),
    }

    match Generation::deserialize(deserializer)? {
        Generation::Number(n) => Ok(n),
        Generation::Text(s) => s.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("n_backup_generation `{s}` is not a number"))
        }),
    }
}

/// The part of the configuration the backup core works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPlan {
    pub bucket: String,
    pub source_root: PathBuf,
    pub worlds: Vec<String>,
    pub generation: usize,
}

/// `worldbak.conf.json` beside the running executable.
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(DEFAULT_CONFIG_NAME)
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, BackupError> {
        if !path.is_file() {
            return Err(BackupError::config(path, "file not found"));
        }

        let config: Config = match path.extension().and_then(|e| e.to_str()) {
            // confy writes a default file for missing paths, hence the check above
            Some("toml") => confy::load_path(path)
                .map_err(|e| BackupError::config(path, e.to_string()))?,
            _ => {
                let raw = fs::read_to_string(path)
                    .map_err(|e| BackupError::config(path, e.to_string()))?;
                serde_json::from_str(&raw).map_err(|e| BackupError::config(path, e.to_string()))?
            }
        };

        config
            .validate()
            .map_err(|reason| BackupError::config(path, reason))?;
        tracing::debug!(
            "Loaded config {} with {} worlds",
            path.display(),
            config.worlds.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.n_backup_generation == 0 {
            return Err("n_backup_generation must be at least 1".to_string());
        }
        if self.s3_bucket.trim().is_empty() {
            return Err("s3_bucket must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for world in &self.worlds {
            if world.is_empty() {
                return Err("world identifiers must not be empty".to_string());
            }
            if world.contains('/') || world.contains('\\') {
                return Err(format!("world `{world}` must be a directory name, not a path"));
            }
            if !seen.insert(world.as_str()) {
                return Err(format!("world `{world}` is listed twice"));
            }
        }
        if self.aws_access_key_id.is_some() != self.aws_secret_access_key.is_some() {
            return Err(
                "aws_access_key_id and aws_secret_access_key must be given together".to_string(),
            );
        }
        if self.max_retries > MAX_RETRIES {
            return Err(format!("max_retries must be at most {MAX_RETRIES}"));
        }
        Ok(())
    }

    /// Directory holding the buckets of the `local` backend.
    pub fn local_store_root(&self) -> PathBuf {
        self.local_root
            .clone()
            .unwrap_or_else(|| self.world_data_path.join(".worldbak"))
    }

    pub fn plan(&self) -> BackupPlan {
        BackupPlan {
            bucket: self.s3_bucket.clone(),
            source_root: self.world_data_path.clone(),
            worlds: self.worlds.clone(),
            generation: self.n_backup_generation,
        }
    }
}
