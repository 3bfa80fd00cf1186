//! Nested sub-behaviors
//!
//! A nested session can carry its own event descriptors (captions,
//! overlays, cue-driven effects) bound to the nested adapter's timeline.
//! The host registers a factory per behavior kind; the session
//! instantiates behaviors from descriptors, enables them while its window
//! is open, and diffs the descriptor set on updates.

use crate::options::NestedEventDescriptor;
use reel_core::MediaAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One live sub-behavior instance
pub trait NestedBehavior: Send {
    /// The session window opened (or the behavior was added mid-window)
    fn enable(&mut self, nested: &MediaAdapter);

    /// The session window closed
    fn disable(&mut self, nested: &MediaAdapter);

    /// The descriptor changed in place
    fn update(&mut self, descriptor: &NestedEventDescriptor);

    /// The descriptor was removed or the session is being torn down
    fn teardown(&mut self);
}

/// Constructor for behaviors of one kind
pub type BehaviorFactory =
    Arc<dyn Fn(&NestedEventDescriptor) -> Box<dyn NestedBehavior> + Send + Sync>;

/// Behavior kinds known to the host
#[derive(Clone, Default)]
pub struct BehaviorRegistry {
    factories: HashMap<String, BehaviorFactory>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, factory: BehaviorFactory) {
        self.factories.insert(kind.into(), factory);
    }

    /// Instantiate a behavior for a descriptor; unknown kinds are skipped
    pub fn create(&self, descriptor: &NestedEventDescriptor) -> Option<Box<dyn NestedBehavior>> {
        match self.factories.get(&descriptor.kind) {
            Some(factory) => Some(factory(descriptor)),
            None => {
                debug!(kind = %descriptor.kind, "no factory for nested behavior kind");
                None
            }
        }
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }
}
