// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{BackupConfig, RetentionScope};
use crate::document::{DocumentHandle, DocumentId};
use crate::error::Result;
use crate::scheduler::{BackupScheduler, SchedulerStats};
use crate::store::{BackupStore, PathNamer};

/// Scheduled backups for one open document.
#[derive(Debug)]
pub struct BackupSession {
    document: DocumentHandle,
    backup_dir: PathBuf,
    store: Arc<BackupStore>,
    scheduler: Mutex<BackupScheduler>,
}

impl BackupSession {
    pub(crate) fn start(
        document: DocumentHandle,
        config: &BackupConfig,
        namer: Arc<dyn PathNamer>,
    ) -> Result<Self> {
        let store = Arc::new(
            BackupStore::new(namer)
                .with_capacity(config.max_backups)
                .with_durability(config.durability),
        );
        let backup_dir = config.backup_dir.clone();

        if config.retention == RetentionScope::Document {
            if let Some(original) = document.path() {
                let evicted = store.adopt_existing(&original, &backup_dir);
                tracing::debug!(
                    document = %document.id(),
                    adopted = store.len(),
                    evicted = evicted.len(),
                    "adopted backups from earlier sessions"
                );
            }
        }

        let task = {
            let document = document.clone();
            let store = store.clone();
            let backup_dir = backup_dir.clone();
            move || store.snapshot(&document, &backup_dir).map(|_| ())
        };
        let scheduler = BackupScheduler::start(
            &document.id().to_string(),
            config.interval(),
            config.worker_threads,
            task,
        )?;

        tracing::info!(
            document = %document.id(),
            path = ?document.path(),
            dir = ?backup_dir,
            "backup session started"
        );
        Ok(Self {
            document,
            backup_dir,
            store,
            scheduler: Mutex::new(scheduler),
        })
    }

    pub fn id(&self) -> DocumentId {
        self.document.id()
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.lock().is_running()
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.lock().stats()
    }

    /// Takes a snapshot on the calling thread, outside the schedule.
    pub fn backup_now(&self) -> Result<Option<PathBuf>> {
        self.store.snapshot(&self.document, &self.backup_dir)
    }

    /// Optionally takes a last snapshot, then stops the schedule.
    ///
    /// The schedule is stopped even when the final snapshot fails; the failure is logged and
    /// returned.
    pub(crate) fn shutdown(&self, create_final_backup: bool) -> Result<Option<PathBuf>> {
        let final_backup = if create_final_backup {
            self.backup_now()
        } else {
            Ok(None)
        };

        if let Err(err) = &final_backup {
            tracing::warn!(document = %self.id(), error = %err, "final backup failed");
        }

        self.scheduler.lock().stop();
        tracing::info!(document = %self.id(), stats = ?self.store.stats(), "backup session stopped");
        final_backup
    }
}
