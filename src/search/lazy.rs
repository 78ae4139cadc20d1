//! Load-once resource cell.
//!
//! Double-checked initialisation: readers that find the value already present
//! never touch the lock; the first caller to miss takes the lock, checks
//! again, and runs the loader. Concurrent first callers block on the lock and
//! then see the loaded value, so the loader runs at most once per success.
//! A failed load leaves the cell empty and the next caller tries again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

pub struct Lazy<T: ?Sized> {
    cell: OnceLock<Arc<T>>,
    init_lock: Mutex<()>,
    loads: AtomicUsize,
}

impl<T: ?Sized> Lazy<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            init_lock: Mutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    /// The value, if it has been loaded.
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns the loaded value, running `load` first if nothing is loaded yet.
    pub fn get_or_try_load<E, F>(&self, load: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<Arc<T>, E>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }

        // The guarded data is `()`, so a poisoned lock carries no broken state.
        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(value) = self.cell.get() {
            return Ok(value.clone());
        }

        self.loads.fetch_add(1, Ordering::SeqCst);
        let value = load()?;
        Ok(self.cell.get_or_init(|| value).clone())
    }

    /// How many times a loader has been invoked (successful or not).
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl<T: ?Sized> Default for Lazy<T> {
    fn default() -> Self {
        Self::new()
    }
}
