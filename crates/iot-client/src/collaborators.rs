//! Collaborators consumed by the poll loop
//!
//! Network provisioning, OTA updates and the hardware reset line are platform
//! concerns. The core only calls them through these seams.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Network link provisioning
#[async_trait]
pub trait Network: Send {
    /// Whether the link (WiFi association or equivalent) is up
    fn is_link_up(&self) -> bool;

    /// Bring the link up, possibly blocking for a long provisioning
    /// interaction. Returns whether it succeeded.
    async fn ensure_link_up(&mut self) -> bool;
}

/// Periodic firmware update check
pub trait Updater: Send {
    /// Called once per loop tick
    fn poll(&mut self);
}

/// Attach point for the hardware reset line.
///
/// [`trigger`](Self::trigger) only stores to an atomic, so it can be called
/// from a signal handler or interrupt context. The poll loop picks the
/// request up as the first action of its next tick.
#[derive(Debug, Clone, Default)]
pub struct ResetHook {
    pending: Arc<AtomicBool>,
}

impl ResetHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a reset
    pub fn trigger(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Consume a pending request
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    /// The shared flag, for registering with a signal handler
    pub fn flag(&self) -> Arc<AtomicBool> {
        self.pending.clone()
    }
}

/// A link that is always up (wired hosts, tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLink;

#[async_trait]
impl Network for StaticLink {
    fn is_link_up(&self) -> bool {
        true
    }

    async fn ensure_link_up(&mut self) -> bool {
        true
    }
}

/// Updater that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUpdates;

impl Updater for NoUpdates {
    fn poll(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_hook_latch() {
        let hook = ResetHook::new();
        let remote = hook.clone();
        assert!(!hook.take());

        remote.trigger();
        assert!(hook.is_pending());
        assert!(hook.take());
        assert!(!hook.is_pending());
        assert!(!hook.take());
    }

    #[test]
    fn test_flag_shared() {
        let hook = ResetHook::new();
        hook.flag().store(true, Ordering::SeqCst);
        assert!(hook.take());
    }
}
