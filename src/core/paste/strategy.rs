//! Injection strategies, ordered primary -> secondary.
//!
//! The executor walks an ordered list of strategies until one delivers.
//! Menu invocation comes first: it does not depend on keyboard-event timing
//! or focus races, so it is the most reliable path when the target exposes
//! an accessibility menu tree. Synthetic keystrokes are the fallback and
//! the only path that works system-wide without a known pid.

use std::sync::Arc;

use tracing::debug;

use crate::shared::types::ForegroundContext;

/// Result of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// The paste action was handed to the OS without error.
    Delivered,
    /// The strategy does not apply here (no pid, no accessibility tree,
    /// no such menu item); fall through to the next one.
    Unavailable,
    /// The strategy applied but a construction or invocation step was
    /// refused by the OS.
    Failed(String),
}

pub trait InjectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_execute(&self, target: Option<&ForegroundContext>) -> StrategyOutcome;
}

/// OS seam: accessibility menu-bar traversal and invocation.
pub trait MenuAccess: Send + Sync {
    /// Locate the paste item in the process's menu tree and press it.
    /// `Ok(false)` when the tree or the item is missing.
    fn invoke_paste_item(&self, pid: i32) -> Result<bool, String>;
}

/// OS seam: synthetic keystroke construction and posting.
pub trait KeySynthesizer: Send + Sync {
    /// Post the platform paste chord (modifier + key-down + key-up),
    /// addressed to `pid` when known, system-wide otherwise. Every
    /// construction step must be checked before anything is posted.
    fn post_paste_chord(&self, pid: Option<i32>) -> Result<(), String>;
}

/// Primary: press the paste item in the target's accessibility menu tree.
pub struct MenuInvokeStrategy {
    menus: Arc<dyn MenuAccess>,
}

impl MenuInvokeStrategy {
    pub fn new(menus: Arc<dyn MenuAccess>) -> Self {
        Self { menus }
    }
}

impl InjectionStrategy for MenuInvokeStrategy {
    fn name(&self) -> &'static str {
        "menu-invoke"
    }

    fn try_execute(&self, target: Option<&ForegroundContext>) -> StrategyOutcome {
        let Some(target) = target else {
            // Menu traversal needs a concrete process.
            return StrategyOutcome::Unavailable;
        };

        match self.menus.invoke_paste_item(target.pid) {
            Ok(true) => StrategyOutcome::Delivered,
            Ok(false) => {
                debug!(
                    "[MenuInvoke] no paste menu item in {} (pid {})",
                    target.name, target.pid
                );
                StrategyOutcome::Unavailable
            }
            Err(e) => StrategyOutcome::Failed(e),
        }
    }
}

/// Secondary: synthesize the paste keystroke.
pub struct KeystrokeStrategy {
    keys: Arc<dyn KeySynthesizer>,
}

impl KeystrokeStrategy {
    pub fn new(keys: Arc<dyn KeySynthesizer>) -> Self {
        Self { keys }
    }
}

impl InjectionStrategy for KeystrokeStrategy {
    fn name(&self) -> &'static str {
        "keystroke"
    }

    fn try_execute(&self, target: Option<&ForegroundContext>) -> StrategyOutcome {
        match self.keys.post_paste_chord(target.map(|t| t.pid)) {
            Ok(()) => StrategyOutcome::Delivered,
            Err(e) => StrategyOutcome::Failed(e),
        }
    }
}

/// The standard primary/secondary pair in order.
pub fn standard_strategies(
    menus: Arc<dyn MenuAccess>,
    keys: Arc<dyn KeySynthesizer>,
) -> Vec<Box<dyn InjectionStrategy>> {
    vec![
        Box::new(MenuInvokeStrategy::new(menus)),
        Box::new(KeystrokeStrategy::new(keys)),
    ]
}
