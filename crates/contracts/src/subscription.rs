//! WatchSlot - owned single-subscription slot for source implementations
//!
//! The `DataSource::watch` contract says a source holds at most one
//! active callback, silently superseded by the next registration. This
//! slot makes the supersession explicit instead of relying on a bare
//! field overwrite, so races stay visible.

use std::sync::{Arc, Mutex};

use crate::{Item, WatchCallback};

/// Current-subscription slot.
///
/// Embed one in a source and forward `DataSource::watch` to
/// [`WatchSlot::replace`]; call [`WatchSlot::publish`] from wherever the
/// source emits items.
#[derive(Default)]
pub struct WatchSlot {
    current: Mutex<Option<WatchCallback>>,
}

impl WatchSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new callback, superseding any previous one
    pub fn replace(&self, callback: WatchCallback) {
        *self.current.lock().unwrap() = Some(callback);
    }

    /// Drop the current callback, if any
    pub fn clear(&self) {
        *self.current.lock().unwrap() = None;
    }

    /// Whether a callback is currently installed
    pub fn is_active(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    /// Publish one item to the current callback.
    ///
    /// Returns `false` when no callback is installed or the callback
    /// asked to stop. A `false` callback return clears the slot, unless
    /// the slot was superseded while the callback ran (pointer identity
    /// check) - the new registration must not be lost.
    ///
    /// The callback runs outside the slot lock, so re-registration from
    /// within a callback cannot deadlock.
    pub fn publish(&self, item: &Item) -> bool {
        let callback = self.current.lock().unwrap().clone();
        let Some(callback) = callback else {
            return false;
        };
        if callback(item) {
            return true;
        }
        let mut current = self.current.lock().unwrap();
        if let Some(existing) = current.as_ref() {
            if Arc::ptr_eq(existing, &callback) {
                *current = None;
            }
        }
        false
    }
}

impl std::fmt::Debug for WatchSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSlot")
            .field("active", &self.is_active())
            .finish()
    }
}
