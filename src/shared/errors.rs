//! Strict error handling with the PasteError enum
//!
//! All variants are serializable for IPC communication with the frontend.
//! The `Display` text is what the user-facing dialog shows, so the
//! permission variants carry the remediation path and the restart caveat.

use serde::Serialize;
use thiserror::Error;

/// Paste subsystem errors
#[derive(Error, Debug, Clone, Serialize)]
#[serde(tag = "type", content = "message")]
pub enum PasteError {
    /// Input-synthesis permission absent or revoked.
    #[error("Accessibility permission is not granted. Enable this app in System Settings > Privacy & Security > Accessibility. macOS may require restarting the app before a fresh grant is recognized.")]
    PermissionDenied,

    /// The OS refused to construct the input-synthesis primitives. This can
    /// happen even when the trust check reports granted, because the OS
    /// caches the trust verdict per-process until restart.
    #[error("Failed to synthesize input events: {0}. If you just granted accessibility access, restart the app; macOS caches the permission per process.")]
    EventCreationFailed(String),

    /// No foreground context and no fallback application. Non-fatal.
    #[error("No target application available for paste")]
    NoTarget,

    /// Permission was not granted within the bounded poll window. Non-fatal;
    /// the background monitor picks up a later grant.
    #[error("Permission was not granted within the polling window")]
    TimedOut,

    /// Any other OS-level failure (process lookup, activation, settings
    /// deep link).
    #[error("System error: {0}")]
    System(String),
}

impl From<std::io::Error> for PasteError {
    fn from(err: std::io::Error) -> Self {
        PasteError::System(err.to_string())
    }
}

pub type PasteResult<T> = Result<T, PasteError>;
