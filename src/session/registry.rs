// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Bibsafe-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Bibsafe and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::document::DocumentId;
use crate::error::Result;
use crate::session::BackupSession;

/// Lifecycle of one document identity inside the registry.
///
/// `lifecycle` is held while the session is started or shut down, so those steps for one
/// document are serialized without blocking any other document. It reads `true` once the slot
/// has left the map; a caller that finds a retired slot looks it up again.
#[derive(Debug, Default)]
struct SessionSlot {
    lifecycle: Mutex<bool>,
    session: RwLock<Option<Arc<BackupSession>>>,
}

impl SessionSlot {
    fn session(&self) -> Option<Arc<BackupSession>> {
        self.session.read().clone()
    }
}

/// Running sessions keyed by document identity.
///
/// The map lock is only held for lookups and inserts. Starting a session, the final snapshot
/// and stopping the scheduler all run under the per-document slot lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: RwLock<HashMap<DocumentId, Arc<SessionSlot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: DocumentId) -> Arc<SessionSlot> {
        if let Some(slot) = self.slots.read().get(&id) {
            return slot.clone();
        }
        self.slots.write().entry(id).or_default().clone()
    }

    fn retire(&self, id: DocumentId, slot: &Arc<SessionSlot>) {
        let mut slots = self.slots.write();
        if slots.get(&id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(&id);
        }
    }

    /// Returns the running session for `id`, or registers the one built by `start`.
    ///
    /// Two concurrent opens of the same document end up with one session. An open that races
    /// a shutdown of the same document waits until that shutdown has finished.
    pub fn get_or_start(
        &self,
        id: DocumentId,
        start: impl FnOnce() -> Result<BackupSession>,
    ) -> Result<Arc<BackupSession>> {
        loop {
            let slot = self.slot(id);
            let mut retired = slot.lifecycle.lock();
            if *retired {
                continue;
            }
            if let Some(session) = slot.session() {
                return Ok(session);
            }

            return match start() {
                Ok(session) => {
                    let session = Arc::new(session);
                    *slot.session.write() = Some(session.clone());
                    Ok(session)
                }
                Err(err) => {
                    *retired = true;
                    self.retire(id, &slot);
                    Err(err)
                }
            };
        }
    }

    /// Runs `stop` on the session of `id` while it is still registered, then unregisters it.
    ///
    /// Returns `None` when no session was running.
    pub fn shutdown<T>(
        &self,
        id: DocumentId,
        stop: impl FnOnce(&BackupSession) -> T,
    ) -> Option<T> {
        let slot = self.slots.read().get(&id).cloned()?;
        let mut retired = slot.lifecycle.lock();
        if *retired {
            return None;
        }
        let session = slot.session()?;

        let stopped = stop(&session);
        *slot.session.write() = None;
        *retired = true;
        self.retire(id, &slot);
        Some(stopped)
    }

    /// Shuts down every registered session through `stop`. Returns how many were running.
    pub fn shutdown_all(&self, stop: impl Fn(&BackupSession)) -> usize {
        let ids = self.slots.read().keys().copied().collect::<Vec<_>>();
        ids.into_iter().filter_map(|id| self.shutdown(id, &stop)).count()
    }

    pub fn get(&self, id: DocumentId) -> Option<Arc<BackupSession>> {
        let slot = self.slots.read().get(&id).cloned()?;
        slot.session()
    }

    pub fn contains(&self, id: DocumentId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.session.read().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
