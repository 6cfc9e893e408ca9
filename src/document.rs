// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Handles to open documents.
//!
//! A [`DocumentHandle`] is what the host application passes in when it opens or closes a
//! document. Its identity is fixed at creation and shared by all clones; its path may change
//! (save-as) and may be absent for a document that was never saved.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc-{}", self.0)
    }
}

/// Produces the bytes written into a backup snapshot.
///
/// Editors holding unsaved state attach one of these so a crash loses nothing that was on
/// screen. Without a source the handle snapshots its file on disk.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> io::Result<Vec<u8>>;
}

impl<F> SnapshotSource for F
where
    F: Fn() -> io::Result<Vec<u8>> + Send + Sync,
{
    fn snapshot(&self) -> io::Result<Vec<u8>> {
        self()
    }
}

struct DocumentInner {
    id: DocumentId,
    path: RwLock<Option<PathBuf>>,
    source: RwLock<Option<Arc<dyn SnapshotSource>>>,
}

#[derive(Clone)]
pub struct DocumentHandle {
    inner: Arc<DocumentInner>,
}

impl DocumentHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_optional_path(Some(path.into()))
    }

    /// A document that has not been saved yet. It is never backed up until it gets a path.
    pub fn unsaved() -> Self {
        Self::with_optional_path(None)
    }

    fn with_optional_path(path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DocumentInner {
                id: DocumentId::next(),
                path: RwLock::new(path),
                source: RwLock::new(None),
            }),
        }
    }

    pub fn with_snapshot_source(self, source: impl SnapshotSource + 'static) -> Self {
        self.set_snapshot_source(Some(Arc::new(source)));
        self
    }

    pub fn set_snapshot_source(&self, source: Option<Arc<dyn SnapshotSource>>) {
        *self.inner.source.write() = source;
    }

    pub fn id(&self) -> DocumentId {
        self.inner.id
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.path.read().clone()
    }

    pub fn set_path(&self, path: impl Into<PathBuf>) {
        *self.inner.path.write() = Some(path.into());
    }

    /// Bytes for a new snapshot of this document stored at `path`.
    pub(crate) fn snapshot_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        let source = self.inner.source.read().clone();
        match source {
            Some(source) => source.snapshot(),
            None => fs::read(path),
        }
    }
}

impl fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("id", &self.inner.id)
            .field("path", &*self.inner.path.read())
            .field("has_snapshot_source", &self.inner.source.read().is_some())
            .finish()
    }
}
