//! Opt-in, throttled state persistence. Reads tolerate missing files
//! and corrupt JSON by returning `None`; writes never propagate an error to
//! the caller — persistence failures are swallowed best-effort.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};

/// Wraps a target path with a minimum interval between writes, silently
/// coalescing bursts. A `throttle_ms` of 0 writes on every call.
pub struct ThrottledWriter {
    path: PathBuf,
    min_interval: Duration,
    last_write: Mutex<Option<Instant>>,
}

impl ThrottledWriter {
    pub fn new(path: impl Into<PathBuf>, throttle_ms: u64) -> Self {
        Self {
            path: path.into(),
            min_interval: Duration::from_millis(throttle_ms),
            last_write: Mutex::new(None),
        }
    }

    /// Serialize `value` and write it, unless the last successful write was
    /// within `min_interval` — in which case this call is a no-op.
    pub fn save<T: Serialize>(&self, value: &T) {
        let mut last_write = self.last_write.lock().unwrap();
        if let Some(last) = *last_write {
            if last.elapsed() < self.min_interval {
                return;
            }
        }
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to create persistence directory");
                return;
            }
        }
        match serde_json::to_string_pretty(value) {
            Ok(json) => match std::fs::write(&self.path, json) {
                Ok(()) => *last_write = Some(Instant::now()),
                Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to write state file"),
            },
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to serialize state"),
        }
    }

    /// Forces a write regardless of throttle state — used for the final
    /// save at the end of a run.
    pub fn save_force<T: Serialize>(&self, value: &T) {
        *self.last_write.lock().unwrap() = None;
        self.save(value);
    }
}

/// Load and deserialize JSON from `path`. Missing file or corrupt JSON both
/// yield `None`; no error escapes.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}
