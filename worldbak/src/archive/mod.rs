use std::io;
use std::path::{Path, PathBuf};

mod zip_archiver;

pub use zip_archiver::ZipArchiver;

/// Produces one compressed artifact from a world directory.
pub trait Archiver: Send + Sync {
    /// Archive `source_root/subdir` so entries keep `subdir/` as their top
    /// level, writing to `dest_without_extension` plus the archive
    /// extension. Returns the path of the produced file.
    fn make_archive(
        &self,
        source_root: &Path,
        subdir: &str,
        dest_without_extension: &Path,
    ) -> io::Result<PathBuf>;
}
