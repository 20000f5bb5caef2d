//! Foreground context tracking.
//!
//! Records which application held input focus immediately before the panel
//! became key, so the paste executor can hand focus back to it later.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::shared::errors::PasteResult;
use crate::shared::types::{ForegroundContext, RunningApp};

/// OS process enumeration and activation seam.
pub trait ProcessQuery: Send + Sync {
    /// Snapshot of the user-facing processes currently running.
    fn running_apps(&self) -> Vec<RunningApp>;

    /// Whether the process is still alive (not terminated).
    fn is_running(&self, pid: i32) -> bool;

    /// Ask the OS to bring the process to the foreground.
    fn activate(&self, pid: i32) -> PasteResult<()>;
}

/// Pick the app that is frontmost, regular, and not this process.
pub(crate) fn select_frontmost(apps: &[RunningApp]) -> Option<ForegroundContext> {
    apps.iter()
        .find(|a| a.is_frontmost && a.is_regular && !a.is_self)
        .map(|a| ForegroundContext {
            pid: a.pid,
            name: a.name.clone(),
        })
}

/// Tracks the single most recent foreground capture.
///
/// The slot is overwritten, not accumulated, on each capture, and handed by
/// value to the executor via [`take`](ForegroundTracker::take).
pub struct ForegroundTracker {
    query: Arc<dyn ProcessQuery>,
    last: Mutex<Option<ForegroundContext>>,
}

impl ForegroundTracker {
    pub fn new(query: Arc<dyn ProcessQuery>) -> Self {
        Self {
            query,
            last: Mutex::new(None),
        }
    }

    /// Capture the current foreground application.
    ///
    /// Must run synchronously at the instant the panel is about to gain
    /// focus: the OS overwrites the frontmost marker the moment the panel
    /// becomes key, so capturing any later records the panel itself.
    /// Returns `None` when no regular frontmost app exists; that is a
    /// normal state, not an error.
    pub fn capture(&self) -> Option<ForegroundContext> {
        let ctx = select_frontmost(&self.query.running_apps());
        match &ctx {
            Some(c) => debug!("[Tracker] captured foreground app: {} (pid {})", c.name, c.pid),
            None => debug!("[Tracker] no regular frontmost application to capture"),
        }
        *self.slot() = ctx.clone();
        ctx
    }

    /// Hand the capture to the executor by value, clearing the slot.
    pub fn take(&self) -> Option<ForegroundContext> {
        self.slot().take()
    }

    /// Peek at the capture without consuming it.
    pub fn current(&self) -> Option<ForegroundContext> {
        self.slot().clone()
    }

    fn slot(&self) -> MutexGuard<'_, Option<ForegroundContext>> {
        match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("[Tracker] slot mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
