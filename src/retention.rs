//! Session directory retention
//!
//! Disk space reclamation over the outputs root: keep the N most recently
//! modified session directories, delete the rest together with their
//! in-memory records. "Most recently modified" means the newest file
//! mtime found anywhere under the directory, falling back to the
//! directory's own mtime when it is empty or unreadable.
//!
//! Sessions still processing are exempt, so an in-flight upload is never
//! deleted. Loose files directly under the root belong to no session and
//! are removed unconditionally. Filesystem errors are logged and skipped;
//! the sweep always finishes.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use uuid::Uuid;

use crate::session::{SessionStatus, SessionStore};

/// Outcome of one retention sweep.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct RetentionReport {
    /// Session directories left in place.
    pub kept: usize,
    /// Session directories removed.
    pub removed_dirs: usize,
    /// Orphaned loose files removed from the root.
    pub removed_files: usize,
}

/// Enforce the retention cap over `root`. Idempotent; a missing or empty
/// root is a successful no-op.
pub async fn enforce(
    root: &Path,
    keep_recent: usize,
    store: &dyn SessionStore,
) -> RetentionReport {
    let mut report = RetentionReport::default();
    if !root.exists() {
        return report;
    }

    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "Cannot read outputs root");
            return report;
        }
    };

    let mut candidates: Vec<(PathBuf, Uuid, SystemTime)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_file() {
            // loose files under the root are orphans
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    report.removed_files += 1;
                    tracing::debug!(path = %path.display(), "Removed orphaned file");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove orphaned file");
                }
            }
            continue;
        }

        let Some(id) = session_id_of(&path) else {
            tracing::debug!(path = %path.display(), "Skipping non-session directory");
            continue;
        };

        if let Some(session) = store.get(id).await {
            if session.status == SessionStatus::Processing {
                continue;
            }
        }

        let freshness = freshness(&path);
        candidates.push((path, id, freshness));
    }

    // newest first
    candidates.sort_by(|a, b| b.2.cmp(&a.2));
    report.kept = candidates.len().min(keep_recent);

    for (path, id, _) in candidates.into_iter().skip(keep_recent) {
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                report.removed_dirs += 1;
                store.delete(id).await;
                tracing::info!(session_id = %id, path = %path.display(), "Evicted session directory");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove session directory");
            }
        }
    }

    // drop records whose directory no longer exists, keeping memory and
    // disk in sync
    for session in store.list().await {
        if session.status == SessionStatus::Processing {
            continue;
        }
        if !root.join(session.dir_name()).exists() {
            store.delete(session.id).await;
        }
    }

    report
}

/// Parse `<kind>_<uuid>` directory names.
fn session_id_of(path: &Path) -> Option<Uuid> {
    let name = path.file_name()?.to_str()?;
    let (prefix, id) = name.split_once('_')?;
    if prefix != "session" && prefix != "convert" {
        return None;
    }
    Uuid::parse_str(id).ok()
}

/// Newest file mtime anywhere under `dir`, or the directory's own mtime.
fn freshness(dir: &Path) -> SystemTime {
    let own = std::fs::metadata(dir)
        .and_then(|m| m.modified())
        .unwrap_or(UNIX_EPOCH);
    max_mtime_under(dir).unwrap_or(own)
}

fn max_mtime_under(dir: &Path) -> Option<SystemTime> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut newest: Option<SystemTime> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let candidate = if path.is_dir() {
            max_mtime_under(&path)
        } else {
            std::fs::metadata(&path).and_then(|m| m.modified()).ok()
        };
        if let Some(time) = candidate {
            newest = Some(newest.map_or(time, |n| n.max(time)));
        }
    }
    newest
}
