//! Change-event model shared by every notification source.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
    Renamed,
}

/// A single filesystem change delivered by a notification source.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Affected absolute path. For renames this is the new path.
    pub path: PathBuf,
    /// Prior path of a rename, when the platform pairs it. Consumers must
    /// not rely on this being present; some drivers only expose one leg.
    pub old_path: Option<PathBuf>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: PathBuf) -> Self {
        Self {
            kind,
            path,
            old_path: None,
        }
    }

    pub fn renamed(path: PathBuf, old_path: Option<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Renamed,
            path,
            old_path,
        }
    }
}

/// Checks whether `path`'s containing directory is exactly `folder`.
pub fn parent_is(path: &Path, folder: &Path) -> bool {
    path.parent().map(|parent| parent == folder).unwrap_or(false)
}
