//! Interning of path attribute lists
//!
//! Routes with identical attributes share one [`PathAttributeList`]. The
//! manager keeps one entry per canonical encoding and hands out
//! [`AttrHandle`]s to it.
//!
//! An entry has two reference counts. Ordinary references are the handles
//! themselves, counted by the [`Arc`]. Managed references are counted
//! separately for holders that do not keep a handle, such as a table scan
//! in progress. The manager only keeps a weak reference of its own, so a
//! list is gone as soon as both counts are zero, whether its last handle
//! was given back with [`AttributeManager::release`] or simply dropped.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::attr_list::PathAttributeList;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Shared handle to an interned attribute list
pub type AttrHandle = Arc<PathAttributeList>;

#[derive(Debug)]
struct Entry {
    list: Weak<PathAttributeList>,
    /// Keeps the list alive while `managed` is not zero
    pin: Option<AttrHandle>,
    managed: usize,
}

impl Entry {
    fn live(&self) -> Option<AttrHandle> {
        self.list.upgrade()
    }

    /// Number of handles held outside the manager
    fn handles(&self) -> usize {
        self.list.strong_count() - usize::from(self.pin.is_some())
    }

    /// Nobody refers to the list anymore
    fn unused(&self) -> bool {
        self.list.strong_count() == 0
    }
}

/// Interning cache of path attribute lists
#[derive(Debug, Default)]
pub struct AttributeManager {
    interned: HashMap<Bytes, Entry>,
}

impl AttributeManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the shared instance of a list, registering `candidate` if there
    /// is none yet
    pub fn intern(&mut self, mut candidate: PathAttributeList) -> AttrHandle {
        candidate.canonicalize();
        let key = candidate.canonical_bytes();
        if let Some(handle) = self.interned.get(&key).and_then(Entry::live) {
            log::trace!("Reusing interned attribute list {:02x?}", candidate.content_hash());
            return handle;
        }
        log::trace!("Interning new attribute list {:02x?}", candidate.content_hash());
        let handle = Arc::new(candidate);
        self.interned.insert(
            key,
            Entry {
                list: Arc::downgrade(&handle),
                pin: None,
                managed: 0,
            },
        );
        handle
    }

    fn entry_mut(&mut self, handle: &AttrHandle) -> &mut Entry {
        match self.interned.get_mut(&handle.canonical_bytes()) {
            Some(entry) if std::ptr::eq(entry.list.as_ptr(), Arc::as_ptr(handle)) => entry,
            _ => panic!("Attribute list is not interned by this manager"),
        }
    }

    fn evict_if_unused(&mut self, key: &Bytes) {
        if self.interned.get(key).is_some_and(Entry::unused) {
            log::debug!("Evicting unused attribute list");
            self.interned.remove(key);
        }
    }

    /// Give back a handle returned by [`intern`](Self::intern)
    ///
    /// Dropping the handle has the same effect, except that the emptied
    /// table slot stays until [`purge`](Self::purge) or the next
    /// [`intern`](Self::intern) of the same content.
    ///
    /// # Panics
    /// If the handle was not issued by this manager.
    pub fn release(&mut self, handle: AttrHandle) {
        let key = handle.canonical_bytes();
        self.entry_mut(&handle);
        drop(handle);
        self.evict_if_unused(&key);
    }

    /// Count a reference held without a handle
    ///
    /// # Panics
    /// If the handle was not issued by this manager.
    pub fn add_managed(&mut self, handle: &AttrHandle) {
        let entry = self.entry_mut(handle);
        entry.managed += 1;
        entry.pin.get_or_insert_with(|| Arc::clone(handle));
    }

    /// Drop a reference counted by [`add_managed`](Self::add_managed)
    ///
    /// # Panics
    /// If the handle was not issued by this manager, or on reference count
    /// underflow.
    pub fn release_managed(&mut self, handle: &AttrHandle) {
        let entry = self.entry_mut(handle);
        entry.managed = entry
            .managed
            .checked_sub(1)
            .expect("Managed reference count underflow");
        if entry.managed == 0 {
            entry.pin = None;
        }
        self.evict_if_unused(&handle.canonical_bytes());
    }

    /// Ordinary (outstanding handles) and managed reference counts of a list
    #[must_use]
    pub fn refcount(&self, list: &PathAttributeList) -> (usize, usize) {
        self.interned
            .get(&list.canonical_bytes())
            .map_or((0, 0), |entry| (entry.handles(), entry.managed))
    }

    /// Check if a list with the same content is interned
    #[must_use]
    pub fn contains(&self, list: &PathAttributeList) -> bool {
        self.interned
            .get(&list.canonical_bytes())
            .is_some_and(|entry| !entry.unused())
    }

    /// Number of interned lists
    #[must_use]
    pub fn len(&self) -> usize {
        self.interned.values().filter(|entry| !entry.unused()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free the table slots of lists whose handles were dropped without
    /// [`release`](Self::release)
    pub fn purge(&mut self) {
        let before = self.interned.len();
        self.interned.retain(|_, entry| !entry.unused());
        log::debug!("Purged {} attribute lists", before - self.interned.len());
    }
}
