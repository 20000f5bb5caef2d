//! Status surface glue.
//!
//! The settings/banner view is an external collaborator; this module is the
//! whole interface it gets: a serializable snapshot plus refresh, request,
//! and dismiss entry points. Visual design does not live here.

use serde::Serialize;
use ts_rs::TS;

use crate::core::permission::request::PermissionRequestFlow;
use crate::core::permission::PermissionMonitor;
use crate::shared::types::{PermissionState, RequestOutcome};

/// Payload backing the permission banner.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PermissionBanner {
    /// Show the banner: permission absent and the user has not dismissed it.
    pub visible: bool,
    pub state: PermissionState,
    /// Trust-signal disagreements since startup; a genuine OS-timing
    /// artifact worth surfacing in telemetry.
    pub disagreements: u64,
}

pub struct PermissionSurface {
    monitor: PermissionMonitor,
    flow: PermissionRequestFlow,
}

impl PermissionSurface {
    pub fn new(monitor: PermissionMonitor, flow: PermissionRequestFlow) -> Self {
        Self { monitor, flow }
    }

    /// Read the last known state without touching the OS.
    pub fn snapshot(&self) -> PermissionBanner {
        let state = self.monitor.state();
        PermissionBanner {
            visible: !state.granted && !state.dismissed_by_user,
            disagreements: self.monitor.disagreement_count(),
            state,
        }
    }

    /// Re-check against the OS and return the fresh state.
    pub fn refresh(&self) -> PermissionState {
        self.monitor.check_now()
    }

    /// Run the full disclosure/settings/poll request flow.
    pub async fn request(&self) -> RequestOutcome {
        self.flow.request_permission().await
    }

    /// The user closed the banner.
    pub fn dismiss(&self) {
        self.monitor.dismiss();
    }
}
