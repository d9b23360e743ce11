//! Backup artifact naming.
//!
//! Object keys are the only link between a stored archive and the world it
//! was taken from, so every key is built and parsed here:
//!
//! ```text
//! <world>_<YYYYMMDDhhmmss>.zip
//! ```
//!
//! The timestamp is rendered in a single fixed offset (UTC+09:00) for every
//! key. Freshness comparisons never look at the rendered text, they compare
//! instants.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, FixedOffset, Utc};

pub const ARCHIVE_EXTENSION: &str = "zip";
pub const KEY_SEPARATOR: char = '_';
pub const BACKUP_UTC_OFFSET_SECS: i32 = 9 * 3600;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const TIMESTAMP_LEN: usize = 14;

/// The offset used to render artifact timestamps.
pub fn backup_offset() -> FixedOffset {
    FixedOffset::east_opt(BACKUP_UTC_OFFSET_SECS).expect("backup offset is within a day")
}

/// Render an instant the way it appears in artifact keys.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&backup_offset())
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Whether an object key carries the archive extension at all.
pub fn has_archive_extension(key: &str) -> bool {
    key.strip_suffix(ARCHIVE_EXTENSION)
        .is_some_and(|stem| stem.ends_with('.'))
}

/// A parsed artifact key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    world: String,
    stamp: String,
}

impl ArtifactKey {
    pub fn new(world: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            world: world.into(),
            stamp: format_timestamp(at),
        }
    }

    /// Parse `<world>_<14 digits>.zip`.
    ///
    /// The world is everything before the last separator, so `A_B_<ts>.zip`
    /// belongs to world `A_B` and never to world `A`.
    pub fn parse(key: &str) -> Option<Self> {
        let stem = key
            .strip_suffix(ARCHIVE_EXTENSION)?
            .strip_suffix('.')?;
        let (world, stamp) = stem.rsplit_once(KEY_SEPARATOR)?;
        if world.is_empty()
            || stamp.len() != TIMESTAMP_LEN
            || !stamp.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(Self {
            world: world.to_string(),
            stamp: stamp.to_string(),
        })
    }

    pub fn world(&self) -> &str {
        &self.world
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}.{}",
            self.world, KEY_SEPARATOR, self.stamp, ARCHIVE_EXTENSION
        )
    }
}

/// The single world/key matching rule.
pub fn key_belongs_to(key: &str, world: &str) -> bool {
    ArtifactKey::parse(key).is_some_and(|parsed| parsed.world == world)
}

/// One backup object in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

impl BackupArtifact {
    pub fn new(key: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            last_modified,
        }
    }

    pub fn belongs_to(&self, world: &str) -> bool {
        key_belongs_to(&self.key, world)
    }
}
