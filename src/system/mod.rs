pub mod automation;

#[cfg(target_os = "macos")]
pub mod clipboard;
