//! Paste executor state machine.
//!
//! Gate -> clipboard -> hide panel -> reactivate target -> settle -> inject.
//! Focus transfer on the OS side is asynchronous; the settle delays exist
//! because injecting too early delivers the paste to the wrong (or no)
//! receiver.

pub mod strategy;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::focus::{select_frontmost, ProcessQuery};
use crate::core::permission::PermissionMonitor;
use crate::shared::types::{ForegroundContext, InjectionOutcome, PasteRequest};
use strategy::{InjectionStrategy, StrategyOutcome};

/// Settle delay after hiding the panel.
pub const DEFAULT_HIDE_SETTLE: Duration = Duration::from_millis(100);
/// Settle delay after activating the target application.
pub const DEFAULT_ACTIVATION_SETTLE: Duration = Duration::from_millis(400);

/// Shell-owned panel seam. Hiding relinquishes key focus and also tears
/// down the shell's outside-click monitor.
pub trait PanelHandle: Send + Sync {
    fn hide(&self);
}

/// Pasteboard seam. The injected paste action pastes whatever is on the
/// clipboard, so the content must land there before injection.
pub trait ClipboardWriter: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), String>;
}

/// Independently tunable settle delays. Policy constants, not protocol
/// requirements.
#[derive(Debug, Clone, Copy)]
pub struct PasteTiming {
    pub hide_settle: Duration,
    pub activation_settle: Duration,
}

impl Default for PasteTiming {
    fn default() -> Self {
        Self {
            hide_settle: DEFAULT_HIDE_SETTLE,
            activation_settle: DEFAULT_ACTIVATION_SETTLE,
        }
    }
}

pub struct PasteExecutor {
    monitor: PermissionMonitor,
    query: Arc<dyn ProcessQuery>,
    panel: Arc<dyn PanelHandle>,
    clipboard: Arc<dyn ClipboardWriter>,
    strategies: Vec<Box<dyn InjectionStrategy>>,
    timing: PasteTiming,
}

impl PasteExecutor {
    pub fn new(
        monitor: PermissionMonitor,
        query: Arc<dyn ProcessQuery>,
        panel: Arc<dyn PanelHandle>,
        clipboard: Arc<dyn ClipboardWriter>,
        strategies: Vec<Box<dyn InjectionStrategy>>,
    ) -> Self {
        Self {
            monitor,
            query,
            panel,
            clipboard,
            strategies,
            timing: PasteTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: PasteTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Run one paste.
    ///
    /// `Succeeded` means every injection call completed without OS-level
    /// error; whether the target actually received the content is
    /// unobservable from outside that process. Cancellable: dropping the
    /// future at a settle point abandons the run (a new panel-hide or paste
    /// supersedes any pending continuation).
    pub async fn execute(&self, request: PasteRequest) -> InjectionOutcome {
        // Gate before touching the panel: a paste that is guaranteed to
        // fail must not flicker the UI.
        if !self.monitor.check_now().granted {
            warn!("[PasteExecutor] permission not granted; refusing to paste");
            return InjectionOutcome::PermissionDenied;
        }

        if let Err(e) = self.clipboard.write_text(&request.content) {
            warn!("[PasteExecutor] clipboard write failed: {}", e);
            return InjectionOutcome::EventCreationFailed;
        }

        self.panel.hide();
        tokio::time::sleep(self.timing.hide_settle).await;

        let target = self.resolve_target(request.target);
        if let Some(ctx) = &target {
            match self.query.activate(ctx.pid) {
                Ok(()) => {
                    debug!("[PasteExecutor] activated {} (pid {})", ctx.name, ctx.pid);
                    tokio::time::sleep(self.timing.activation_settle).await;
                }
                // Best effort: the pid is still worth addressing directly.
                Err(e) => warn!("[PasteExecutor] failed to activate {}: {}", ctx.name, e),
            }
        } else {
            debug!("[PasteExecutor] no target application; injecting system-wide");
        }

        let mut last_failure: Option<String> = None;
        for s in &self.strategies {
            match s.try_execute(target.as_ref()) {
                StrategyOutcome::Delivered => {
                    info!("[PasteExecutor] paste delivered via {}", s.name());
                    return if target.is_some() {
                        InjectionOutcome::Succeeded
                    } else {
                        InjectionOutcome::NoTarget
                    };
                }
                StrategyOutcome::Unavailable => {
                    debug!("[PasteExecutor] {} unavailable, falling through", s.name());
                }
                StrategyOutcome::Failed(e) => {
                    warn!("[PasteExecutor] {} failed: {}", s.name(), e);
                    last_failure = Some(e);
                }
            }
        }

        if last_failure.is_none() {
            warn!("[PasteExecutor] no applicable injection strategy");
        }
        InjectionOutcome::EventCreationFailed
    }

    /// Captured target if still live, otherwise a best-effort substitute:
    /// whatever regular non-self app is frontmost right now.
    fn resolve_target(&self, requested: Option<ForegroundContext>) -> Option<ForegroundContext> {
        if let Some(ctx) = requested {
            if self.query.is_running(ctx.pid) {
                return Some(ctx);
            }
            debug!(
                "[PasteExecutor] captured target {} (pid {}) has terminated; falling back",
                ctx.name, ctx.pid
            );
        }
        select_frontmost(&self.query.running_apps())
    }
}
