//! On-disk layout of a session directory
//!
//! `outputs/<kind>_<session-id>/{documents,images,metadata}/...`
//! The directory tree is owned exclusively by its session and removed as a
//! unit on cleanup.

use std::path::{Path, PathBuf};

/// Resolved paths for one session's directory tree.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    pub fn new(output_root: &Path, dir_name: &str) -> Self {
        Self {
            root: output_root.join(dir_name),
        }
    }

    /// The session directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Uploaded input documents.
    pub fn documents(&self) -> PathBuf {
        self.root.join("documents")
    }

    /// Images extracted by the engine.
    pub fn images(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Engine output directory (converted artifacts and metadata).
    pub fn metadata(&self) -> PathBuf {
        self.root.join("metadata")
    }

    /// Create the whole tree.
    pub fn create_all(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.documents())?;
        std::fs::create_dir_all(self.images())?;
        std::fs::create_dir_all(self.metadata())?;
        Ok(())
    }
}
