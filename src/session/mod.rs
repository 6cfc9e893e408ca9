// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Per-document backup sessions and the manager that keeps track of them.
//!
//! The lifecycle the host application drives:
//!
//! - [`BackupManager::start`] when a document is opened,
//! - [`BackupManager::shutdown`] when it is closed,
//! - [`BackupManager::backup_file_differs`] / [`BackupManager::restore_backup`] /
//!   [`BackupManager::discard_backup`] when deciding about crash recovery, typically before
//!   any session for that document exists.

mod backup_session;
mod manager;
mod registry;

pub use backup_session::BackupSession;
pub use manager::BackupManager;
pub use registry::SessionRegistry;
