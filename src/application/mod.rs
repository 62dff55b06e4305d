// Application layer - Polling, scheduling and telemetry state
pub mod coordinator;
pub mod debounce;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod settings_store;
pub mod status_client;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
