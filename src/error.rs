// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::io;
use std::path::PathBuf;

pub type Result<T, E = BackupError> = std::result::Result<T, E>;

/// Failures raised by the backup subsystem.
///
/// Background failures (`PathResolution`, `SnapshotWrite`, `Eviction`) are logged and
/// recovered by the session that hit them. `Restore` is always returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("cannot prepare backup directory {path:?}: {source}")]
    PathResolution { path: PathBuf, source: io::Error },

    #[error("cannot write backup snapshot {path:?}: {source}")]
    SnapshotWrite { path: PathBuf, source: io::Error },

    #[error("cannot delete evicted backup {path:?}: {source}")]
    Eviction { path: PathBuf, source: io::Error },

    #[error("cannot restore {original:?} from {backup:?}: {source}")]
    Restore {
        original: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },

    #[error("cannot compare {original:?} with {backup:?}: {source}")]
    Comparison {
        original: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },

    #[error("document has no path on disk")]
    DocumentWithoutPath,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read configuration {path:?}: {source}")]
    ConfigIo { path: PathBuf, source: io::Error },

    #[error("cannot parse configuration {path:?}: {source}")]
    ConfigJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot start backup worker pool: {0}")]
    Scheduler(#[source] io::Error),
}

impl BackupError {
    /// Whether the failure belongs to the steady-state background path that a session
    /// recovers from on its own.
    pub fn is_background(&self) -> bool {
        matches!(
            self,
            Self::PathResolution { .. } | Self::SnapshotWrite { .. } | Self::Eviction { .. }
        )
    }
}
