//! Host plugin boundary
//!
//! The host timeline framework owns scheduling: it decides when a plugin's
//! window opens and closes and feeds option changes through. A plugin
//! implements exactly these four entry points.

use crate::options::NestedUpdate;

/// Timeline context delivered with a lifecycle hook
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineEvent {
    /// Parent-timeline position when the hook fired
    pub time: f64,
}

impl TimelineEvent {
    pub fn at(time: f64) -> Self {
        Self { time }
    }
}

/// Lifecycle hooks invoked by the host timeline framework
pub trait TimelinePlugin: Send {
    /// The plugin's visible window opened
    fn start(&mut self, event: &TimelineEvent);

    /// The plugin's visible window closed
    fn end(&mut self, event: &TimelineEvent);

    /// Option fields changed; may arrive in any state
    fn update(&mut self, changes: NestedUpdate);

    /// The host is removing the plugin instance for good
    fn teardown(&mut self);
}
