// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Bibsafe: rotating automatic backups for open bibliography documents.
//!
//! While a document is open, a [`BackupSession`] snapshots it at a fixed period into a shared
//! backup directory, keeping the newest few snapshots. After a crash the host application asks
//! [`BackupManager::backup_file_differs`] whether there is something to recover, then either
//! [`BackupManager::restore_backup`] or [`BackupManager::discard_backup`].

pub mod config;
pub mod document;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod store;

pub use config::{BackupConfig, RetentionScope, WriteDurability};
pub use document::{DocumentHandle, DocumentId, SnapshotSource};
pub use error::{BackupError, Result};
pub use scheduler::{BackupScheduler, SchedulerStats};
pub use session::{BackupManager, BackupSession, SessionRegistry};
pub use store::{BackupStore, PathNamer, StoreStats, TimestampNamer};
