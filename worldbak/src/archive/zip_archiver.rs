use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
};

use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use super::Archiver;
use crate::artifact::ARCHIVE_EXTENSION;

#[derive(Debug, Clone)]
pub struct ZipArchiver {
    method: CompressionMethod,
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Deflated,
        }
    }
}

impl ZipArchiver {
    pub fn stored() -> Self {
        Self {
            method: CompressionMethod::Stored,
        }
    }

    /// Entry name inside the archive, always `/`-separated
    fn entry_name(relative: &Path) -> String {
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn write_archive(&self, source_root: &Path, source: &Path, archive_path: &Path) -> io::Result<()> {
        let file = File::create(archive_path)?;
        let mut writer = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default().compression_method(self.method);

        for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(source_root) else {
                continue;
            };
            let name = Self::entry_name(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                writer.add_directory(name, options)?;
            } else if file_type.is_file() {
                let size = entry.metadata()?.len();
                writer.start_file(name, options.large_file(size >= u32::MAX as u64))?;
                let mut reader = BufReader::new(
                    File::open(path)
                        .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))?,
                );
                io::copy(&mut reader, &mut writer)?;
            } else {
                tracing::warn!("Skip non-regular file: {}", path.display());
            }
        }

        writer.finish()?;
        Ok(())
    }
}

impl Archiver for ZipArchiver {
    fn make_archive(
        &self,
        source_root: &Path,
        subdir: &str,
        dest_without_extension: &Path,
    ) -> io::Result<PathBuf> {
        let source = source_root.join(subdir);
        if !fs::metadata(&source)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("source is not a directory: {}", source.display()),
            ));
        }

        // append rather than replace, world names may contain dots
        let mut archive_path = OsString::from(dest_without_extension.as_os_str());
        archive_path.push(".");
        archive_path.push(ARCHIVE_EXTENSION);
        let archive_path = PathBuf::from(archive_path);

        tracing::info!(
            "Archiving {} to {}",
            source.display(),
            archive_path.display()
        );
        if let Err(e) = self.write_archive(source_root, &source, &archive_path) {
            let _ = fs::remove_file(&archive_path);
            return Err(e);
        }
        Ok(archive_path)
    }
}
