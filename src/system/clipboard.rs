//! System clipboard writer.
//!
//! Uses cli-clipboard for system-level pasteboard access without activating
//! this app; a fresh context per write keeps the type stateless.

use cli_clipboard::{ClipboardContext, ClipboardProvider};

use crate::core::paste::ClipboardWriter;

pub struct SystemClipboard;

impl ClipboardWriter for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), String> {
        ClipboardContext::new()
            .and_then(|mut ctx| ctx.set_contents(text.to_owned()))
            .map_err(|e| e.to_string())
    }
}
