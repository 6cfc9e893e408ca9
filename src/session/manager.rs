// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::BackupConfig;
use crate::document::DocumentHandle;
use crate::error::Result;
use crate::session::{BackupSession, SessionRegistry};
use crate::store::{BackupStore, PathNamer, TimestampNamer};

/// Application-level entry point for automatic backups.
///
/// Owns the registry of running sessions. Create one per process (or per test) and hand it to
/// whatever opens and closes documents.
#[derive(Debug)]
pub struct BackupManager {
    config: BackupConfig,
    namer: Arc<dyn PathNamer>,
    registry: SessionRegistry,
    /// Store without a session, used for lookups that must work before any document is open.
    files: BackupStore,
}

impl BackupManager {
    pub fn new(config: BackupConfig) -> Result<Self> {
        Self::with_namer(config, Arc::new(TimestampNamer::new()))
    }

    pub fn with_namer(config: BackupConfig, namer: Arc<dyn PathNamer>) -> Result<Self> {
        config.validate()?;
        let files = BackupStore::new(namer.clone()).with_durability(config.durability);
        Ok(Self {
            config,
            namer,
            registry: SessionRegistry::new(),
            files,
        })
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn backup_dir(&self) -> &Path {
        &self.config.backup_dir
    }

    /// Starts scheduled backups for `document` into the configured backup directory.
    ///
    /// Starting a document that already has a running session returns that session.
    pub fn start(&self, document: &DocumentHandle) -> Result<Arc<BackupSession>> {
        self.registry.get_or_start(document.id(), || {
            BackupSession::start(document.clone(), &self.config, self.namer.clone())
        })
    }

    /// Stops the session of `document`, optionally after one last snapshot.
    ///
    /// The session stays registered until its scheduler has stopped, so a concurrent `start`
    /// of the same document waits and then gets a fresh session. It leaves the registry
    /// whether or not the final snapshot succeeds. Returns false when no session was running.
    pub fn shutdown(&self, document: &DocumentHandle, create_final_backup: bool) -> bool {
        self.registry
            .shutdown(document.id(), |session| {
                let _ = session.shutdown(create_final_backup);
            })
            .is_some()
    }

    /// Stops every running session. Returns how many were stopped.
    pub fn shutdown_all(&self, create_final_backup: bool) -> usize {
        self.registry.shutdown_all(|session| {
            let _ = session.shutdown(create_final_backup);
        })
    }

    pub fn is_running(&self, document: &DocumentHandle) -> bool {
        self.registry.contains(document.id())
    }

    pub fn running_count(&self) -> usize {
        self.registry.len()
    }

    pub fn session(&self, document: &DocumentHandle) -> Option<Arc<BackupSession>> {
        self.registry.get(document.id())
    }

    /// Takes an immediate snapshot through the running session of `document`.
    ///
    /// Returns `Ok(None)` when no session is running or the document has no path.
    pub fn backup_now(&self, document: &DocumentHandle) -> Result<Option<PathBuf>> {
        match self.registry.get(document.id()) {
            Some(session) => session.backup_now(),
            None => Ok(None),
        }
    }

    /// Replaces `original` with its latest backup in `backup_dir`.
    ///
    /// Returns the backup that was restored, or `None` (leaving `original` untouched) when
    /// there is no backup.
    pub fn restore_backup(&self, original: &Path, backup_dir: &Path) -> Result<Option<PathBuf>> {
        let Some(latest) = self.files.latest_backup_path(original, backup_dir) else {
            return Ok(None);
        };
        self.files.restore(original, &latest)?;
        tracing::info!(original = ?original, backup = ?latest, "restored backup");
        Ok(Some(latest))
    }

    /// Whether the latest backup of `original` holds changes the file on disk does not.
    pub fn backup_file_differs(&self, original: &Path, backup_dir: &Path) -> bool {
        self.files
            .latest_backup_path(original, backup_dir)
            .is_some_and(|latest| self.files.is_different_from_latest(original, &latest))
    }

    /// Records that the user dismissed the pending backup of `document`.
    ///
    /// Creating the marker is best-effort: failures are logged, and a missing marker only
    /// means the user is asked again. Returns whether the marker exists afterwards.
    pub fn discard_backup(&self, document: &DocumentHandle, backup_dir: &Path) -> bool {
        let Some(original) = document.path() else {
            return false;
        };
        let marker = self.files.discard_marker_for(&original, backup_dir);

        let created = fs::create_dir_all(backup_dir).and_then(|()| {
            fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&marker)
                .map(drop)
        });
        match created {
            Ok(()) => {
                tracing::info!(marker = ?marker, "discarded pending backup");
                true
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => true,
            Err(err) => {
                tracing::warn!(marker = ?marker, error = %err, "cannot create discard marker");
                false
            }
        }
    }

    /// Whether the host should offer to recover `original` from its backup.
    ///
    /// A discard marker answers "no" once and is consumed, so a later crash prompts again.
    pub fn needs_recovery_prompt(&self, original: &Path, backup_dir: &Path) -> bool {
        let marker = self.files.discard_marker_for(original, backup_dir);
        match fs::remove_file(&marker) {
            Ok(()) => return false,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(marker = ?marker, error = %err, "cannot consume discard marker");
                return false;
            }
        }
        self.backup_file_differs(original, backup_dir)
    }

    pub fn discard_marker_path(&self, original: &Path, backup_dir: &Path) -> PathBuf {
        self.files.discard_marker_for(original, backup_dir)
    }

    /// Existing backups of `original`, oldest first.
    pub fn list_backups(&self, original: &Path, backup_dir: &Path) -> Vec<PathBuf> {
        self.files.list_backups(original, backup_dir)
    }
}

impl Drop for BackupManager {
    fn drop(&mut self) {
        self.shutdown_all(false);
    }
}
