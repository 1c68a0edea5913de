//! App lifecycle observation.
//!
//! The platform shell reports visibility changes here; hooks fire only on a
//! background-to-foreground edge. Re-entrancy is not the monitor's problem:
//! the coordinator's phase machine coalesces overlapping recovery attempts,
//! so firing a hook twice is safe.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Process visibility as reported by the platform.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AppVisibility {
    Foreground,
    Background,
}

/// Consumer of foreground transitions.
#[async_trait]
pub trait ForegroundHook: Send + Sync {
    async fn on_foreground(&self);
}

/// Observes visibility transitions and fires hooks on each return to the
/// foreground.
pub struct LifecycleMonitor {
    visibility: Mutex<AppVisibility>,
    hooks: Vec<Arc<dyn ForegroundHook>>,
}

impl LifecycleMonitor {
    /// A freshly launched app starts in the foreground; the first recovery
    /// check after a cold start is driven by `fire_foreground`.
    pub fn new() -> Self {
        Self {
            visibility: Mutex::new(AppVisibility::Foreground),
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn ForegroundHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Record a visibility change, firing hooks on the background-to-
    /// foreground edge only.
    pub async fn set_visibility(&self, next: AppVisibility) {
        let fire = {
            let mut current = self.visibility.lock().await;
            let edge = *current == AppVisibility::Background && next == AppVisibility::Foreground;
            *current = next;
            edge
        };
        if fire {
            debug!("foreground transition; firing recovery hooks");
            self.fire_foreground().await;
        }
    }

    /// Fire hooks unconditionally (cold start, deep-link arrival).
    pub async fn fire_foreground(&self) {
        for hook in &self.hooks {
            hook.on_foreground().await;
        }
    }
}

impl Default for LifecycleMonitor {
    fn default() -> Self {
        Self::new()
    }
}
