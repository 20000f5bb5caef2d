//! Focus-aware paste subsystem for a clipboard/snippet panel.
//!
//! When the panel steals input focus, the app the user was working in is no
//! longer frontmost, so "paste this item" has to (1) remember who held focus
//! before the panel appeared, (2) hold a reliable answer to whether the OS
//! lets this process synthesize input at all, and (3) hand focus back and
//! inject the paste despite asynchronous focus transfer and cached, lagging
//! permission state.
//!
//! The OS touchpoints are all trait seams so every piece is testable with
//! fakes; [`OsBindings::platform`] wires the real macOS implementations.

pub mod api;
pub mod core;
pub mod shared;
pub mod system;

use std::sync::Arc;

use crate::api::surface::PermissionSurface;
use crate::core::focus::{ForegroundTracker, ProcessQuery};
use crate::core::paste::strategy::{self, KeySynthesizer, MenuAccess};
use crate::core::paste::{ClipboardWriter, PanelHandle, PasteExecutor, PasteTiming};
use crate::core::permission::request::{DisclosurePrompt, PermissionRequestFlow};
use crate::core::permission::{PermissionMonitor, TrustProbe, DEFAULT_POLL_INTERVAL};

pub use crate::shared::errors::{PasteError, PasteResult};
pub use crate::shared::types::{
    ForegroundContext, InjectionOutcome, PasteRequest, PermissionState, RequestOutcome,
};

/// The OS-facing half of the subsystem, injected at construction so tests
/// (and other platforms) can substitute fakes without global state.
pub struct OsBindings {
    pub query: Arc<dyn ProcessQuery>,
    pub probe: Arc<dyn TrustProbe>,
    pub menus: Arc<dyn MenuAccess>,
    pub keys: Arc<dyn KeySynthesizer>,
    pub clipboard: Arc<dyn ClipboardWriter>,
}

#[cfg(target_os = "macos")]
impl OsBindings {
    /// The real macOS bindings.
    pub fn platform() -> Self {
        use crate::system::automation::{
            MacosKeySynthesizer, MacosMenuAccess, MacosProcessQuery, MacosTrustProbe,
        };
        use crate::system::clipboard::SystemClipboard;

        Self {
            query: Arc::new(MacosProcessQuery),
            probe: Arc::new(MacosTrustProbe),
            menus: Arc::new(MacosMenuAccess),
            keys: Arc::new(MacosKeySynthesizer),
            clipboard: Arc::new(SystemClipboard),
        }
    }
}

/// Fully wired subsystem: tracker + monitor + executor + status surface.
///
/// The shell owns the panel and the disclosure dialog and passes them in;
/// everything else comes from [`OsBindings`].
pub struct PasteSubsystem {
    tracker: ForegroundTracker,
    monitor: PermissionMonitor,
    executor: PasteExecutor,
    surface: PermissionSurface,
}

impl PasteSubsystem {
    pub fn new(
        bindings: OsBindings,
        panel: Arc<dyn PanelHandle>,
        prompt: Arc<dyn DisclosurePrompt>,
    ) -> Self {
        Self::with_timing(bindings, panel, prompt, PasteTiming::default())
    }

    pub fn with_timing(
        bindings: OsBindings,
        panel: Arc<dyn PanelHandle>,
        prompt: Arc<dyn DisclosurePrompt>,
        timing: PasteTiming,
    ) -> Self {
        let monitor = PermissionMonitor::new(Arc::clone(&bindings.probe));
        let tracker = ForegroundTracker::new(Arc::clone(&bindings.query));

        let flow = PermissionRequestFlow::new(
            monitor.clone_arc(),
            Arc::clone(&bindings.probe),
            prompt,
        );
        let surface = PermissionSurface::new(monitor.clone_arc(), flow);

        let strategies = strategy::standard_strategies(bindings.menus, bindings.keys);
        let executor = PasteExecutor::new(
            monitor.clone_arc(),
            bindings.query,
            panel,
            bindings.clipboard,
            strategies,
        )
        .with_timing(timing);

        Self {
            tracker,
            monitor,
            executor,
            surface,
        }
    }

    /// Call synchronously right before the panel becomes key.
    pub fn panel_will_show(&self) -> Option<ForegroundContext> {
        self.tracker.capture()
    }

    /// Paste `content` back into the app captured at panel-open.
    ///
    /// The capture is consumed only once the run makes it past the
    /// permission gate: a denied paste leaves the panel up, and a retry
    /// after granting must still address the originally captured app.
    pub async fn paste(&self, content: impl Into<String>) -> InjectionOutcome {
        let target = self.tracker.current();
        let outcome = self
            .executor
            .execute(PasteRequest {
                content: content.into(),
                target,
            })
            .await;
        if outcome != InjectionOutcome::PermissionDenied {
            self.tracker.take();
        }
        outcome
    }

    /// Start the background grant/revoke poll at the default interval.
    pub fn start_monitoring(&self) {
        self.monitor.start_polling(DEFAULT_POLL_INTERVAL);
    }

    /// Stop background polling; no continuation fires afterwards.
    pub fn shutdown(&self) {
        self.monitor.stop_polling();
    }

    pub fn tracker(&self) -> &ForegroundTracker {
        &self.tracker
    }

    pub fn monitor(&self) -> &PermissionMonitor {
        &self.monitor
    }

    pub fn executor(&self) -> &PasteExecutor {
        &self.executor
    }

    /// The interface handed to the settings/banner view.
    pub fn surface(&self) -> &PermissionSurface {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paste::strategy::{KeySynthesizer, MenuAccess};
    use crate::core::paste::{ClipboardWriter, PanelHandle, PasteTiming};
    use crate::core::permission::request::{DisclosureChoice, DisclosurePrompt};
    use crate::core::permission::tests::FakeTrustProbe;
    use crate::shared::types::RunningApp;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeQuery;

    impl ProcessQuery for FakeQuery {
        fn running_apps(&self) -> Vec<RunningApp> {
            vec![RunningApp {
                pid: 42,
                name: "Editor".to_string(),
                is_frontmost: true,
                is_regular: true,
                is_self: false,
            }]
        }
        fn is_running(&self, pid: i32) -> bool {
            pid == 42
        }
        fn activate(&self, _pid: i32) -> PasteResult<()> {
            Ok(())
        }
    }

    struct NoMenus;
    impl MenuAccess for NoMenus {
        fn invoke_paste_item(&self, _pid: i32) -> Result<bool, String> {
            Ok(false)
        }
    }

    struct FakeKeys {
        posted: Mutex<Vec<Option<i32>>>,
    }
    impl KeySynthesizer for FakeKeys {
        fn post_paste_chord(&self, pid: Option<i32>) -> Result<(), String> {
            self.posted.lock().unwrap().push(pid);
            Ok(())
        }
    }

    struct FakePanel {
        hides: AtomicU64,
    }
    impl PanelHandle for FakePanel {
        fn hide(&self) {
            self.hides.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeClipboard {
        writes: Mutex<Vec<String>>,
    }
    impl ClipboardWriter for FakeClipboard {
        fn write_text(&self, text: &str) -> Result<(), String> {
            self.writes.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct NeverAsked;
    #[async_trait]
    impl DisclosurePrompt for NeverAsked {
        async fn present(&self) -> DisclosureChoice {
            DisclosureChoice::Decline
        }
    }

    #[tokio::test]
    async fn panel_open_then_paste_round_trip() {
        let keys = Arc::new(FakeKeys {
            posted: Mutex::new(Vec::new()),
        });
        let panel = Arc::new(FakePanel {
            hides: AtomicU64::new(0),
        });
        let clipboard = Arc::new(FakeClipboard {
            writes: Mutex::new(Vec::new()),
        });

        let bindings = OsBindings {
            query: Arc::new(FakeQuery),
            probe: Arc::new(FakeTrustProbe::granted(true)),
            menus: Arc::new(NoMenus),
            keys: keys.clone(),
            clipboard: clipboard.clone(),
        };
        let subsystem = PasteSubsystem::with_timing(
            bindings,
            panel.clone(),
            Arc::new(NeverAsked),
            PasteTiming {
                hide_settle: Duration::ZERO,
                activation_settle: Duration::ZERO,
            },
        );

        let captured = subsystem.panel_will_show();
        assert_eq!(captured.as_ref().map(|c| c.pid), Some(42));

        let outcome = subsystem.paste("hello").await;
        assert_eq!(outcome, InjectionOutcome::Succeeded);
        assert_eq!(panel.hides.load(Ordering::SeqCst), 1);
        assert_eq!(*clipboard.writes.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(*keys.posted.lock().unwrap(), vec![Some(42)]);
        // The capture is consumed by the paste.
        assert!(subsystem.tracker().current().is_none());
    }

    #[tokio::test]
    async fn denied_paste_preserves_capture_for_retry() {
        let probe = Arc::new(FakeTrustProbe::granted(false));
        let keys = Arc::new(FakeKeys {
            posted: Mutex::new(Vec::new()),
        });
        let bindings = OsBindings {
            query: Arc::new(FakeQuery),
            probe: probe.clone(),
            menus: Arc::new(NoMenus),
            keys: keys.clone(),
            clipboard: Arc::new(FakeClipboard {
                writes: Mutex::new(Vec::new()),
            }),
        };
        let subsystem = PasteSubsystem::with_timing(
            bindings,
            Arc::new(FakePanel {
                hides: AtomicU64::new(0),
            }),
            Arc::new(NeverAsked),
            PasteTiming {
                hide_settle: Duration::ZERO,
                activation_settle: Duration::ZERO,
            },
        );

        subsystem.panel_will_show();
        assert_eq!(subsystem.paste("hello").await, InjectionOutcome::PermissionDenied);
        // The capture survives the denial so a retry still addresses the
        // originally captured app.
        assert_eq!(subsystem.tracker().current().map(|c| c.pid), Some(42));

        probe.set_granted(true);
        assert_eq!(subsystem.paste("hello").await, InjectionOutcome::Succeeded);
        assert_eq!(*keys.posted.lock().unwrap(), vec![Some(42)]);
        assert!(subsystem.tracker().current().is_none());
    }

    #[tokio::test]
    async fn surface_reflects_denied_permission() {
        let bindings = OsBindings {
            query: Arc::new(FakeQuery),
            probe: Arc::new(FakeTrustProbe::granted(false)),
            menus: Arc::new(NoMenus),
            keys: Arc::new(FakeKeys {
                posted: Mutex::new(Vec::new()),
            }),
            clipboard: Arc::new(FakeClipboard {
                writes: Mutex::new(Vec::new()),
            }),
        };
        let subsystem = PasteSubsystem::new(
            bindings,
            Arc::new(FakePanel {
                hides: AtomicU64::new(0),
            }),
            Arc::new(NeverAsked),
        );

        subsystem.surface().refresh();
        assert!(subsystem.surface().snapshot().visible);
        assert_eq!(subsystem.paste("hello").await, InjectionOutcome::PermissionDenied);
    }
}
