//! Platform implementations of the OS seams.

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "macos")]
pub use macos::{MacosKeySynthesizer, MacosMenuAccess, MacosProcessQuery, MacosTrustProbe};
