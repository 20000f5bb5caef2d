//! Input-synthesis permission state monitoring.
//!
//! The OS answer to "may this process synthesize input events?" is cached
//! per-process until restart, so a single trust query is not reliable right
//! after the user toggles the setting. The monitor therefore cross-validates
//! two signals and only reports granted when both agree; disagreement is an
//! expected transient and is counted rather than swallowed.

pub mod request;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::shared::errors::PasteResult;
use crate::shared::types::PermissionState;

/// Reference polling interval. A tuning constant, not a correctness
/// requirement; consumers only rely on eventual consistency within a few
/// polling cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// OS trust/permission seam for synthetic input.
pub trait TrustProbe: Send + Sync {
    /// Non-prompting trust query. Safe to call at any frequency.
    fn is_trusted(&self) -> bool;

    /// Prompting variant. Only ever invoked by the explicit request flow;
    /// polling must never trigger a system dialog.
    fn prompt_trust(&self) -> bool;

    /// Capability probe: attempt to construct the low-level facility used
    /// for input injection. Construction failing is itself evidence the
    /// permission is absent, independent of what the trust query says.
    fn can_create_event_source(&self) -> bool;

    /// Open the OS privacy-settings pane for this permission class.
    fn open_privacy_settings(&self) -> PasteResult<()>;
}

/// Single-writer permission state holder.
///
/// `check_now` is the sole mutator of the state; everything else reads.
/// Clones share the same state, probe, and polling task.
pub struct PermissionMonitor {
    probe: Arc<dyn TrustProbe>,
    state: Arc<Mutex<PermissionState>>,
    disagreements: Arc<AtomicU64>,
    poll_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PermissionMonitor {
    pub fn new(probe: Arc<dyn TrustProbe>) -> Self {
        Self {
            probe,
            state: Arc::new(Mutex::new(PermissionState::unchecked())),
            disagreements: Arc::new(AtomicU64::new(0)),
            poll_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Get a clone sharing the same underlying state (for handing to the
    /// executor, request flow, and status surface).
    pub fn clone_arc(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            state: Arc::clone(&self.state),
            disagreements: Arc::clone(&self.disagreements),
            poll_task: Arc::clone(&self.poll_task),
        }
    }

    /// Re-query both trust signals and fold the result into the state.
    ///
    /// Idempotent and safe to call at any frequency. Only reports granted
    /// when the trust query and the capability probe agree.
    pub fn check_now(&self) -> PermissionState {
        let trusted = self.probe.is_trusted();
        let can_inject = self.probe.can_create_event_source();

        if trusted != can_inject {
            self.disagreements.fetch_add(1, Ordering::Relaxed);
            warn!(
                "[PermissionMonitor] trust signals disagree (trust_query={}, event_source={}); the OS caches the trust verdict per-process until restart",
                trusted, can_inject
            );
        }

        let granted = trusted && can_inject;

        let mut state = self.state_guard();
        if granted && !state.granted {
            info!("[PermissionMonitor] input-synthesis permission granted");
            // A future revocation must re-surface the banner.
            state.dismissed_by_user = false;
        } else if !granted && state.granted {
            warn!("[PermissionMonitor] input-synthesis permission revoked");
        }
        state.granted = granted;
        state.last_checked_at = Utc::now();
        state.clone()
    }

    /// Read the last known state without touching the OS.
    pub fn state(&self) -> PermissionState {
        self.state_guard().clone()
    }

    /// Mark the permission banner as dismissed by the user.
    pub fn dismiss(&self) {
        self.state_guard().dismissed_by_user = true;
        debug!("[PermissionMonitor] banner dismissed by user");
    }

    /// How often the two trust signals have disagreed since startup.
    pub fn disagreement_count(&self) -> u64 {
        self.disagreements.load(Ordering::Relaxed)
    }

    /// Start the background grant/revoke poll. Supersedes any previous
    /// polling task. Must be called within a tokio runtime.
    pub fn start_polling(&self, interval: Duration) {
        let mut task = self.poll_guard();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let monitor = self.clone_arc();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                monitor.check_now();
            }
        }));
        debug!("[PermissionMonitor] polling started (interval {:?})", interval);
    }

    /// Stop the background poll. The task handle is invalidated explicitly;
    /// no continuation fires after this returns.
    pub fn stop_polling(&self) {
        if let Some(task) = self.poll_guard().take() {
            task.abort();
            debug!("[PermissionMonitor] polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poll_guard().is_some()
    }

    fn state_guard(&self) -> MutexGuard<'_, PermissionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("[PermissionMonitor] state mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn poll_guard(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.poll_task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("[PermissionMonitor] poll mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    /// Configurable trust probe fake; counts non-prompting checks.
    pub(crate) struct FakeTrustProbe {
        pub trusted: AtomicBool,
        pub can_create: AtomicBool,
        pub checks: AtomicU64,
        pub prompts: AtomicU64,
        pub settings_opened: AtomicU64,
    }

    impl FakeTrustProbe {
        pub fn granted(value: bool) -> Self {
            Self {
                trusted: AtomicBool::new(value),
                can_create: AtomicBool::new(value),
                checks: AtomicU64::new(0),
                prompts: AtomicU64::new(0),
                settings_opened: AtomicU64::new(0),
            }
        }

        pub fn set_granted(&self, value: bool) {
            self.trusted.store(value, Ordering::SeqCst);
            self.can_create.store(value, Ordering::SeqCst);
        }
    }

    impl TrustProbe for FakeTrustProbe {
        fn is_trusted(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            self.trusted.load(Ordering::SeqCst)
        }

        fn prompt_trust(&self) -> bool {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.trusted.load(Ordering::SeqCst)
        }

        fn can_create_event_source(&self) -> bool {
            self.can_create.load(Ordering::SeqCst)
        }

        fn open_privacy_settings(&self) -> PasteResult<()> {
            self.settings_opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn check_now_requires_both_signals() {
        let probe = Arc::new(FakeTrustProbe::granted(true));
        probe.can_create.store(false, Ordering::SeqCst);

        let monitor = PermissionMonitor::new(probe);
        assert!(!monitor.check_now().granted);
        assert_eq!(monitor.disagreement_count(), 1);
    }

    #[test]
    fn check_now_is_idempotent_without_os_change() {
        let monitor = PermissionMonitor::new(Arc::new(FakeTrustProbe::granted(true)));

        let first = monitor.check_now();
        for _ in 0..10 {
            let state = monitor.check_now();
            assert_eq!(state.granted, first.granted);
            assert_eq!(state.dismissed_by_user, first.dismissed_by_user);
        }
        assert_eq!(monitor.disagreement_count(), 0);
    }

    #[test]
    fn grant_transition_resets_dismissed_flag() {
        let probe = Arc::new(FakeTrustProbe::granted(false));
        let monitor = PermissionMonitor::new(Arc::clone(&probe) as Arc<dyn TrustProbe>);

        monitor.check_now();
        monitor.dismiss();
        assert!(monitor.state().dismissed_by_user);

        probe.set_granted(true);
        let state = monitor.check_now();
        assert!(state.granted);
        assert!(!state.dismissed_by_user);
    }

    #[test]
    fn revocation_leaves_dismissed_flag_untouched() {
        let probe = Arc::new(FakeTrustProbe::granted(true));
        let monitor = PermissionMonitor::new(Arc::clone(&probe) as Arc<dyn TrustProbe>);
        monitor.check_now();
        monitor.dismiss();

        probe.set_granted(false);
        let state = monitor.check_now();
        assert!(!state.granted);
        assert!(state.dismissed_by_user, "already-dismissed stays dismissed");
    }

    #[tokio::test]
    async fn polling_converges_within_a_few_cycles() {
        let probe = Arc::new(FakeTrustProbe::granted(false));
        let monitor = PermissionMonitor::new(Arc::clone(&probe) as Arc<dyn TrustProbe>);

        monitor.start_polling(Duration::from_millis(5));
        probe.set_granted(true);

        // Eventually consistent within a few polling cycles; no dependence
        // on the exact interval.
        let mut granted = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if monitor.state().granted {
                granted = true;
                break;
            }
        }
        monitor.stop_polling();
        assert!(granted);
    }

    #[tokio::test]
    async fn stop_polling_prevents_further_checks() {
        let probe = Arc::new(FakeTrustProbe::granted(false));
        let monitor = PermissionMonitor::new(Arc::clone(&probe) as Arc<dyn TrustProbe>);

        monitor.start_polling(Duration::from_millis(2));
        tokio::time::sleep(Duration::from_millis(20)).await;
        monitor.stop_polling();
        assert!(!monitor.is_polling());

        // Let any stale continuation fire if one survived the abort.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let after_stop = probe.checks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(probe.checks.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn start_polling_supersedes_previous_task() {
        let probe = Arc::new(FakeTrustProbe::granted(false));
        let monitor = PermissionMonitor::new(Arc::clone(&probe) as Arc<dyn TrustProbe>);

        monitor.start_polling(Duration::from_millis(2));
        monitor.start_polling(Duration::from_millis(2));
        monitor.stop_polling();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let settled = probe.checks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(probe.checks.load(Ordering::SeqCst), settled);
    }
}
