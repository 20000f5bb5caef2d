//! Shared data types for the paste subsystem.
//!
//! Everything the status-surface webview reads crosses the IPC boundary as
//! JSON, so those types carry `Serialize` and ts-rs bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Identity of the application that held input focus before the panel
/// became key.
///
/// Captured once per panel-open and handed by value to the paste executor.
/// The pid may refer to a terminated process by the time it is used; liveness
/// is re-checked at the moment of use, never assumed from the capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ForegroundContext {
    pub pid: i32,
    pub name: String,
}

/// A user-facing process as reported by the OS process enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApp {
    pub pid: i32,
    pub name: String,
    /// Marked active/frontmost by the OS.
    pub is_frontmost: bool,
    /// Regular activation policy: shows in the Dock and can own key focus.
    /// Background agents and daemons are not paste targets.
    pub is_regular: bool,
    /// This process itself; never a paste target.
    pub is_self: bool,
}

/// Snapshot of the input-synthesis trust state.
///
/// Written only by `PermissionMonitor::check_now`; read by the status surface
/// and the paste executor's gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PermissionState {
    pub granted: bool,
    pub last_checked_at: DateTime<Utc>,
    /// The user closed the permission banner. Force-reset to `false`
    /// whenever `granted` transitions false -> true so a later revocation
    /// re-surfaces the banner.
    pub dismissed_by_user: bool,
}

impl PermissionState {
    pub fn unchecked() -> Self {
        Self {
            granted: false,
            last_checked_at: Utc::now(),
            dismissed_by_user: false,
        }
    }
}

/// One paste invocation. Ephemeral; discarded after the executor completes.
#[derive(Debug, Clone)]
pub struct PasteRequest {
    pub content: String,
    pub target: Option<ForegroundContext>,
}

/// Terminal result of one executor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum InjectionOutcome {
    /// Injection completed without OS-level error. Whether the target
    /// actually received the paste is unobservable from outside that
    /// process; this is a documented limitation, not a bug.
    Succeeded,
    /// Permission absent at the gate; nothing was attempted.
    PermissionDenied,
    /// No captured target and no fallback app; injection was still
    /// attempted system-wide as a last resort. Non-fatal.
    NoTarget,
    /// The OS refused to construct the input-synthesis primitives.
    /// Near-always a permission symptom, but distinct from the gate: it
    /// can occur even when the trust check reported granted, because the
    /// OS caches the trust verdict per-process until restart.
    EventCreationFailed,
}

/// Result of an explicit permission request flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub enum RequestOutcome {
    Granted,
    Declined,
    /// The user did not grant within the poll window. The background
    /// monitor picks up a later grant.
    TimedOut,
}
