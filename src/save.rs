//! Save targets: where a finished PDF goes.
//!
//! In a browser the document would be handed to a download prompt. Here the
//! generator calls a [`SaveTarget`], which is the last step of every
//! successful request, cache hits included.

use crate::error::Score2PdfError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Receiver of finished documents.
pub trait SaveTarget: Send + Sync {
    /// Deliver `bytes` under `file_name` (including the `.pdf` extension).
    fn save(&self, bytes: &[u8], file_name: &str) -> Result<(), Score2PdfError>;
}

/// Writes documents into a directory.
///
/// Uses an atomic write (temp file in the same directory + rename) so a
/// reader never sees a partial PDF.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path a document named `file_name` is written to.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }
}

impl SaveTarget for DirectorySaver {
    fn save(&self, bytes: &[u8], file_name: &str) -> Result<(), Score2PdfError> {
        let path = self.path_for(file_name);
        let failed = |source: std::io::Error| Score2PdfError::SaveFailed {
            path: path.clone(),
            source,
        };

        if !is_plain_file_name(file_name) {
            return Err(failed(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{file_name}' is not a plain file name"),
            )));
        }

        std::fs::create_dir_all(&self.dir).map_err(failed)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(failed)?;
        tmp.write_all(bytes).map_err(failed)?;
        tmp.persist(&path).map_err(|e| failed(e.error))?;

        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// A single path component that stays inside the target directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}
