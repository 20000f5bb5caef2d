//! Explicit permission request flow.
//!
//! Disclosure first, then the OS prompt plus the privacy-settings deep link,
//! then a bounded poll for the grant. Each call is independent; "already
//! asked" suppression is UI policy and does not live here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{PermissionMonitor, TrustProbe};
use crate::shared::types::RequestOutcome;

/// Reference poll bounds; tuning constants.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
pub const DEFAULT_ATTEMPT_SPACING: Duration = Duration::from_secs(1);

/// User's answer to the disclosure dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisclosureChoice {
    OpenSettings,
    Decline,
}

/// Seam for the shell-owned disclosure dialog that explains why the
/// permission is needed before anything OS-visible happens.
#[async_trait]
pub trait DisclosurePrompt: Send + Sync {
    async fn present(&self) -> DisclosureChoice;
}

/// Bounds for the post-disclosure grant poll.
#[derive(Debug, Clone, Copy)]
pub struct RequestTuning {
    pub max_attempts: u32,
    pub attempt_spacing: Duration,
}

impl Default for RequestTuning {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_spacing: DEFAULT_ATTEMPT_SPACING,
        }
    }
}

pub struct PermissionRequestFlow {
    monitor: PermissionMonitor,
    probe: Arc<dyn TrustProbe>,
    prompt: Arc<dyn DisclosurePrompt>,
    tuning: RequestTuning,
}

impl PermissionRequestFlow {
    pub fn new(
        monitor: PermissionMonitor,
        probe: Arc<dyn TrustProbe>,
        prompt: Arc<dyn DisclosurePrompt>,
    ) -> Self {
        Self {
            monitor,
            probe,
            prompt,
            tuning: RequestTuning::default(),
        }
    }

    pub fn with_tuning(mut self, tuning: RequestTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Run one full request cycle.
    ///
    /// Already granted returns immediately without a disclosure. Otherwise:
    /// disclosure -> (decline | OS prompt + settings pane + bounded poll).
    /// Cancellable: dropping the future at any await point abandons the
    /// poll without side effects.
    pub async fn request_permission(&self) -> RequestOutcome {
        if self.monitor.check_now().granted {
            debug!("[RequestFlow] permission already granted");
            return RequestOutcome::Granted;
        }

        if self.prompt.present().await == DisclosureChoice::Decline {
            debug!("[RequestFlow] user declined the disclosure");
            return RequestOutcome::Declined;
        }

        // Fire the system prompt before opening settings so the dialog lands
        // on top of the pane the user is about to use.
        let _ = self.probe.prompt_trust();
        if let Err(e) = self.probe.open_privacy_settings() {
            warn!("[RequestFlow] failed to open privacy settings: {}", e);
        }

        for attempt in 0..self.tuning.max_attempts {
            tokio::time::sleep(self.tuning.attempt_spacing).await;
            if self.monitor.check_now().granted {
                info!(
                    "[RequestFlow] permission granted after {} attempt(s)",
                    attempt + 1
                );
                return RequestOutcome::Granted;
            }
        }

        warn!(
            "[RequestFlow] permission not granted within {} attempts; background polling will pick up a later grant",
            self.tuning.max_attempts
        );
        RequestOutcome::TimedOut
    }
}
