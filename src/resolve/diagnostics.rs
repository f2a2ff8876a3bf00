//! On-disk diagnostics: raw pages and resolution traces per DOI.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ResolutionTrace;

/// Default diagnostics directory name.
pub const DEFAULT_DIAGNOSTICS_DIR: &str = "debug_openalex";

/// Which page a saved HTML artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Landing,
    View,
}

impl PageKind {
    fn suffix(self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::View => "view",
        }
    }
}

/// Directory receiving `{safe_doi}_landing.html`, `{safe_doi}_view.html` and
/// `{safe_doi}_log.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticsDir {
    root: PathBuf,
}

impl DiagnosticsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a page artifact.
    #[must_use]
    pub fn page_path(&self, safe_doi: &str, kind: PageKind) -> PathBuf {
        self.root.join(format!("{safe_doi}_{}.html", kind.suffix()))
    }

    /// Path of the trace artifact.
    #[must_use]
    pub fn trace_path(&self, safe_doi: &str) -> PathBuf {
        self.root.join(format!("{safe_doi}_log.json"))
    }

    /// Writes raw page bytes, creating the directory when needed.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn save_page(&self, safe_doi: &str, kind: PageKind, body: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.page_path(safe_doi, kind);
        tokio::fs::write(&path, body).await?;
        debug!(path = %path.display(), "saved page snapshot");
        Ok(path)
    }

    /// Writes the trace as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error (serialization failures are reported
    /// as [`io::ErrorKind::Other`]).
    pub async fn save_trace(&self, safe_doi: &str, trace: &ResolutionTrace) -> io::Result<PathBuf> {
        let json = trace.to_json_pretty().map_err(io::Error::other)?;
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.trace_path(safe_doi);
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}
