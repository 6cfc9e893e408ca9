// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{WriteDurability, DEFAULT_MAX_BACKUPS};
use crate::document::DocumentHandle;
use crate::error::{BackupError, Result};
use crate::store::path_namer::{PathNamer, TimestampNamer};

mod helpers;

use helpers::{contents_differ, copy_atomic, modified_after, write_atomic};

#[derive(Debug, Default)]
struct BackupQueue {
    entries: VecDeque<PathBuf>,
    /// Evicted files whose deletion failed; retried before the next insert.
    pending_deletions: Vec<PathBuf>,
    added: u64,
    evicted: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub added: u64,
    pub evicted: u64,
    pub queued: usize,
    pub pending_deletions: usize,
}

/// Retains, evicts, compares and restores the backups of one open document.
///
/// The queue only knows about backups registered through this instance; its mutations are
/// serialized by an internal lock, so the scheduled task and a final snapshot taken on
/// shutdown can race without breaking the capacity bound.
#[derive(Debug)]
pub struct BackupStore {
    namer: Arc<dyn PathNamer>,
    capacity: usize,
    durability: WriteDurability,
    queue: Mutex<BackupQueue>,
}

impl Default for BackupStore {
    fn default() -> Self {
        Self::new(Arc::new(TimestampNamer::new()))
    }
}

impl BackupStore {
    pub fn new(namer: Arc<dyn PathNamer>) -> Self {
        Self {
            namer,
            capacity: DEFAULT_MAX_BACKUPS,
            durability: WriteDurability::default(),
            queue: Mutex::new(BackupQueue::default()),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn namer(&self) -> &Arc<dyn PathNamer> {
        &self.namer
    }

    /// Queued backups, oldest first.
    pub fn queued(&self) -> Vec<PathBuf> {
        self.queue.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let queue = self.queue.lock();
        StoreStats {
            added: queue.added,
            evicted: queue.evicted,
            queued: queue.entries.len(),
            pending_deletions: queue.pending_deletions.len(),
        }
    }

    /// Registers `path` as the newest backup, evicting (and deleting) the oldest ones while the
    /// queue is at capacity. Returns the evicted paths.
    ///
    /// A failed deletion never blocks the insert; the path is remembered and deleted on a later
    /// call.
    pub fn add_backup(&self, path: impl Into<PathBuf>) -> Vec<PathBuf> {
        let mut queue = self.queue.lock();
        queue.added += 1;
        self.insert_locked(&mut queue, path.into())
    }

    /// Adopts backups left behind by earlier sessions of `original`, oldest first, trimming the
    /// queue to capacity. Returns the evicted paths.
    pub fn adopt_existing(&self, original: &Path, backup_dir: &Path) -> Vec<PathBuf> {
        let existing = self.namer.existing_backups(original, backup_dir);
        let mut queue = self.queue.lock();
        let mut evicted = Vec::new();
        for path in existing {
            if queue.entries.contains(&path) {
                continue;
            }
            evicted.extend(self.insert_locked(&mut queue, path));
        }
        evicted
    }

    fn insert_locked(&self, queue: &mut BackupQueue, path: PathBuf) -> Vec<PathBuf> {
        queue.pending_deletions.retain(|pending| delete_backup(pending).is_err());

        let mut evicted = Vec::new();
        while queue.entries.len() >= self.capacity {
            let Some(oldest) = queue.entries.pop_front() else {
                break;
            };
            queue.evicted += 1;
            match delete_backup(&oldest) {
                Ok(()) => tracing::debug!(path = ?oldest, "evicted backup"),
                Err(err) => {
                    tracing::warn!(error = %err, "eviction failed; will retry on next backup");
                    queue.pending_deletions.push(oldest.clone());
                }
            }
            evicted.push(oldest);
        }

        queue.entries.push_back(path);
        evicted
    }

    pub fn new_backup_path(&self, original: &Path, backup_dir: &Path) -> Result<PathBuf> {
        self.namer.new_backup_path(original, backup_dir)
    }

    pub fn latest_backup_path(&self, original: &Path, backup_dir: &Path) -> Option<PathBuf> {
        self.namer.latest_backup_path(original, backup_dir)
    }

    /// Existing backups of `original`, oldest first, whether or not this store created them.
    pub fn list_backups(&self, original: &Path, backup_dir: &Path) -> Vec<PathBuf> {
        self.namer.existing_backups(original, backup_dir)
    }

    /// Writes a new snapshot of `document` into `backup_dir` and registers it.
    ///
    /// Returns `Ok(None)` for a document without a path. The snapshot is written to a temp
    /// file first, so a failing snapshot source never leaves a partial backup behind.
    pub fn snapshot(&self, document: &DocumentHandle, backup_dir: &Path) -> Result<Option<PathBuf>> {
        let Some(original) = document.path() else {
            return Ok(None);
        };

        let backup_path = self.new_backup_path(&original, backup_dir)?;
        let write = |backup_path: &Path| -> io::Result<()> {
            let contents = document.snapshot_bytes(&original)?;
            write_atomic(backup_path, &contents, self.durability)
        };
        write(&backup_path).map_err(|source| BackupError::SnapshotWrite {
            path: backup_path.clone(),
            source,
        })?;

        self.add_backup(backup_path.clone());
        tracing::debug!(document = %document.id(), path = ?backup_path, "wrote backup");
        Ok(Some(backup_path))
    }

    /// Replaces `original` with the content of `backup`.
    ///
    /// The copy goes through a temp file and a rename, so a failed restore leaves `original`
    /// as it was.
    pub fn restore(&self, original: &Path, backup: &Path) -> Result<()> {
        copy_atomic(backup, original, self.durability).map_err(|source| BackupError::Restore {
            original: original.to_path_buf(),
            backup: backup.to_path_buf(),
            source,
        })
    }

    /// Whether `backup` holds changes that `original` does not.
    ///
    /// A backup that is not strictly newer than the original is stale and never counts as
    /// different. I/O failures count as different.
    pub fn is_different_from_latest(&self, original: &Path, backup: &Path) -> bool {
        let compared = modified_after(backup, original).and_then(|newer| {
            if newer {
                contents_differ(original, backup)
            } else {
                Ok(false)
            }
        });

        compared.unwrap_or_else(|source| {
            let err = BackupError::Comparison {
                original: original.to_path_buf(),
                backup: backup.to_path_buf(),
                source,
            };
            tracing::warn!(error = %err, "treating backup as different");
            true
        })
    }

    /// Location of the discard marker for `original`. Does not create it.
    pub fn discard_marker_for(&self, original: &Path, backup_dir: &Path) -> PathBuf {
        self.namer.discard_marker_path(original, backup_dir)
    }
}

fn delete_backup(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BackupError::Eviction {
            path: path.to_path_buf(),
            source,
        }),
    }
}
