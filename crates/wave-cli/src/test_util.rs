//! Helpers for unit tests that touch process-wide state.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Serialize tests that read or write environment variables.
pub fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run `f` with `XDG_CONFIG_HOME` pointing at `dir`, restoring it afterwards.
///
/// Callers must hold [`lock_env`].
pub fn with_config_home(dir: &Path, f: impl FnOnce()) {
    let original = std::env::var("XDG_CONFIG_HOME").ok();
    unsafe { std::env::set_var("XDG_CONFIG_HOME", dir) };

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    match original {
        Some(x) => unsafe { std::env::set_var("XDG_CONFIG_HOME", x) },
        None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
    }
    if let Err(panic) = result {
        std::panic::resume_unwind(panic);
    }
}
