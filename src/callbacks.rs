/* Copyright 2023-2025 Bruce Merry
 *
 * This program is free software: you can redistribute it and/or modify it
 * under the terms of the GNU General Public License as published by the Free
 * Software Foundation, either version 3 of the License, or (at your option)
 * any later version.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT
 * ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
 * FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
 * more details.
 *
 * You should have received a copy of the GNU General Public License along
 * with this program. If not, see <https://www.gnu.org/licenses/>.
 */

use log::warn;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

/// Listener invoked after each fetch cycle.
///
/// Listeners are identified by the allocation behind the `Arc`, so the same
/// handle must be kept to remove it again.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

fn same(a: &Callback, b: &Callback) -> bool {
    // Compare data pointers only: vtable pointers for the same closure are
    // not guaranteed to be unique.
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Set of listeners. Clones share the same set.
#[derive(Clone, Default)]
pub struct Callbacks {
    callbacks: Arc<Mutex<Vec<Callback>>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, callback: Callback) {
        let mut callbacks = self.callbacks.lock().unwrap();
        if !callbacks.iter().any(|c| same(c, &callback)) {
            callbacks.push(callback);
        }
    }

    pub fn remove(&self, callback: &Callback) {
        self.callbacks.lock().unwrap().retain(|c| !same(c, callback));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }

    fn contains(&self, callback: &Callback) -> bool {
        self.callbacks.lock().unwrap().iter().any(|c| same(c, callback))
    }

    /// Invoke every registered listener.
    ///
    /// The set is copied before iterating, so listeners may register or
    /// remove listeners (including themselves). A listener removed part-way
    /// through a pass is not invoked. A listener that panics is logged and
    /// skipped.
    pub fn publish(&self) {
        let snapshot = self.callbacks.lock().unwrap().clone();
        for callback in snapshot {
            if !self.contains(&callback) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                warn!("Tank update listener panicked");
            }
        }
    }
}
