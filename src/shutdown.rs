// Copyright 2024 the phosphene-stream contributors
// SPDX-License-Identifier: MPL-2.0

//! Cooperative shutdown. Nothing here interrupts a loop; the loops ask.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use parking_lot::{Condvar, Mutex};

/// Raised either by the host writing a marker file, or from inside the
/// process (exit token, socket failure, Ctrl-C). Cheap to clone; all
/// clones see the same flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    marker: Option<PathBuf>,
    raised: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Watches for a file at `marker`. The host creates it when it wants
    /// us gone.
    pub fn with_marker(marker: impl Into<PathBuf>) -> ShutdownSignal {
        return ShutdownSignal {
            marker: Some(marker.into()),
            raised: Arc::new(AtomicBool::new(false)),
        };
    }

    /// Only reacts to [`ShutdownSignal::raise`].
    pub fn manual() -> ShutdownSignal {
        return ShutdownSignal {
            marker: None,
            raised: Arc::new(AtomicBool::new(false)),
        };
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        if self.raised.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(marker) = &self.marker {
            if marker.exists() {
                info!("Found shutdown file {}", marker.display());
                self.raise();
                return true;
            }
        }
        return false;
    }

    pub fn marker(&self) -> Option<&Path> {
        return self.marker.as_deref();
    }
}

/// One-shot flag the receive loop trips on its first good frame. The main
/// loop waits on it in short slices so it can still notice shutdown.
#[derive(Debug, Clone, Default)]
pub struct ReadyLatch {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ReadyLatch {
    pub fn new() -> ReadyLatch {
        return ReadyLatch::default();
    }

    /// Idempotent; only the first call wakes anybody.
    pub fn trip(&self) {
        let (ready, condvar) = &*self.inner;
        let mut ready = ready.lock();
        if !*ready {
            *ready = true;
            condvar.notify_all();
        }
    }

    pub fn is_tripped(&self) -> bool {
        return *self.inner.0.lock();
    }

    /// Waits up to `timeout` for the latch. Returns whether it is tripped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (ready, condvar) = &*self.inner;
        let mut ready = ready.lock();
        if !*ready {
            condvar.wait_for(&mut ready, timeout);
        }
        return *ready;
    }

    /// Blocks until the latch trips or `shutdown` is requested, checking
    /// shutdown every `poll`. Returns whether the latch tripped.
    pub fn wait_until_ready(&self, shutdown: &ShutdownSignal, poll: Duration) -> bool {
        loop {
            if self.wait_timeout(poll) {
                return true;
            }
            if shutdown.is_requested() {
                return false;
            }
        }
    }
}
