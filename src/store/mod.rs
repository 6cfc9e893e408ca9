// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Backup files on disk.
//!
//! [`PathNamer`] decides where backups and discard markers live; [`BackupStore`] writes,
//! retains, evicts, compares and restores them for one document.

pub mod backup_store;
pub mod path_namer;

pub use backup_store::{BackupStore, StoreStats};
pub use path_namer::{PathNamer, TimestampNamer};
