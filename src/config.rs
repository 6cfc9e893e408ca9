// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Backup configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a valid config.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BackupError, Result};

pub const DEFAULT_INTERVAL_MS: u64 = 19_000;
pub const DEFAULT_MAX_BACKUPS: usize = 10;
pub const DEFAULT_WORKER_THREADS: usize = 2;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDurability {
    /// Writes a temp file and renames it into place without fsync.
    #[default]
    BestEffort,

    /// Additionally flushes the file and its parent directory to stable storage where the
    /// platform supports it.
    Durable,
}

/// How far the retention cap reaches.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionScope {
    /// Each session starts with an empty queue; backups left by earlier sessions are never
    /// evicted by this one.
    #[default]
    Session,

    /// On start, existing backups of the document are adopted into the queue (oldest first)
    /// and trimmed to the cap.
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    pub backup_dir: PathBuf,
    pub interval_ms: u64,
    pub max_backups: usize,
    pub durability: WriteDurability,
    pub retention: RetentionScope,
    pub worker_threads: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_dir: std::env::temp_dir().join("bibsafe-backups"),
            interval_ms: DEFAULT_INTERVAL_MS,
            max_backups: DEFAULT_MAX_BACKUPS,
            durability: WriteDurability::default(),
            retention: RetentionScope::default(),
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

impl BackupConfig {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn with_retention(mut self, retention: RetentionScope) -> Self {
        self.retention = retention;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| BackupError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| BackupError::ConfigJson {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(BackupError::Config("interval_ms must be greater than zero".into()));
        }
        if self.max_backups == 0 {
            return Err(BackupError::Config("max_backups must be greater than zero".into()));
        }
        if self.worker_threads == 0 {
            return Err(BackupError::Config("worker_threads must be greater than zero".into()));
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(BackupError::Config("backup_dir must not be empty".into()));
        }
        Ok(())
    }
}
