//! Packaging downloaded PDFs into a single zip archive.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Errors raised while building an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Reading the source directory or writing the archive failed.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The zip encoder rejected an entry.
    #[error("zip error writing {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The blocking packaging task did not complete.
    #[error("archive task failed: {reason}")]
    Task { reason: String },
}

impl ArchiveError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            source,
        }
    }
}

/// What ended up in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Entry names in archive order.
    pub files: Vec<String>,
    /// Size of the finished archive in bytes.
    pub bytes: u64,
}

/// Zips every `*.pdf` directly inside `source_dir` into `archive_path`.
///
/// Entries are deflate-compressed and sorted by name. An empty directory
/// still yields a valid (empty) archive.
///
/// # Errors
///
/// Returns [`ArchiveError`] when the directory cannot be listed or the
/// archive cannot be written.
#[instrument(skip_all, fields(source_dir = %source_dir.display(), archive = %archive_path.display()))]
pub async fn package_pdfs(source_dir: &Path, archive_path: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let source_dir = source_dir.to_path_buf();
    let archive_path = archive_path.to_path_buf();
    let summary = tokio::task::spawn_blocking(move || write_archive(&source_dir, &archive_path))
        .await
        .map_err(|e| ArchiveError::Task {
            reason: e.to_string(),
        })??;
    info!(files = summary.files.len(), bytes = summary.bytes, "archive written");
    Ok(summary)
}

fn pdf_files(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ArchiveError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ArchiveError::io(dir, e))?.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn write_archive(source_dir: &Path, archive_path: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let files = pdf_files(source_dir)?;
    if let Some(parent) = archive_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
    }

    let out = File::create(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut names = Vec::with_capacity(files.len());
    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| ArchiveError::zip(path, e))?;
        let mut source = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        io::copy(&mut source, &mut writer).map_err(|e| ArchiveError::io(path, e))?;
        debug!(entry = %name, "added to archive");
        names.push(name);
    }

    let mut buffered = writer
        .finish()
        .map_err(|e| ArchiveError::zip(archive_path, e))?;
    io::Write::flush(&mut buffered).map_err(|e| ArchiveError::io(archive_path, e))?;
    drop(buffered);

    let bytes = std::fs::metadata(archive_path)
        .map_err(|e| ArchiveError::io(archive_path, e))?
        .len();
    Ok(ArchiveSummary {
        path: archive_path.to_path_buf(),
        files: names,
        bytes,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_package_includes_only_pdfs_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF-b").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"%PDF-a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();
        let archive = dir.path().join("bundle").join("pdfs.zip");

        let summary = package_pdfs(dir.path(), &archive).await.unwrap();

        assert_eq!(summary.files, vec!["a.PDF", "b.pdf"]);
        assert!(summary.bytes > 0);

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        let mut content = String::new();
        zip.by_name("b.pdf").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "%PDF-b");
    }

    #[tokio::test]
    async fn test_empty_directory_gives_empty_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("empty.zip");

        let summary = package_pdfs(dir.path(), &archive).await.unwrap();

        assert!(summary.files.is_empty());
        let zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 0);
    }

    #[tokio::test]
    async fn test_missing_source_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = package_pdfs(&dir.path().join("absent"), &dir.path().join("x.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }), "unexpected error: {err}");
    }
}
