//! One-time engine initialization.
//!
//! Interpreters carry a global built-in function table that must be
//! populated exactly once per process, before the first bridge instance
//! is constructed. This module wraps that in idempotent, thread-safe
//! lazy initialization with an explicit "already initialized" query.

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

static INIT: Once = Once::new();
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Run `f` exactly once per process.
///
/// Concurrent callers block until the winning call finishes, so no
/// thread can observe a half-populated function table. Safe to call any
/// number of times; later calls are no-ops.
pub fn init_builtins(f: impl FnOnce()) {
    INIT.call_once(|| {
        f();
        INITIALIZED.store(true, Ordering::Release);
    });
}

/// True once `init_builtins` has completed.
pub fn builtins_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}
