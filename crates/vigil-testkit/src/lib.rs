//! # vigil-testkit
//!
//! Fakes for the collaborators Vigil only knows through traits, plus small
//! fixtures shared by the integration tests of several crates.
//!
//! ```rust,ignore
//! let provider = Arc::new(FakeProvider::new());
//! provider.set_results("sanctions", vec![candidate("Q1", 0.93)]);
//! ```

mod access;
mod cases;
mod enrichment;
pub mod fixtures;
mod provider;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use access::{Permission, TestAccess};
pub use cases::RecordingCaseManager;
pub use enrichment::RecordingEnrichment;
pub use provider::{FakeProvider, candidate, org_entity};

/// Lock a mutex, ignoring poisoning from a panicked test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
