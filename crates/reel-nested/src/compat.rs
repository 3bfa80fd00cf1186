//! Plugin compatibility gate
//!
//! Some environments cannot run a plugin at all (the canonical case:
//! platforms unable to play two media streams at once). Rather than fail
//! registration, an incompatible plugin is substituted with a fallback
//! hook set: a host-registered stand-in, or the inert null plugin.

use crate::options::NestedUpdate;
use crate::plugin::{TimelineEvent, TimelinePlugin};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Probe answering why the environment cannot run a plugin, if it cannot
pub type IncompatibilityProbe = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Constructor for plugin (or fallback) instances
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn TimelinePlugin> + Send + Sync>;

/// A plugin that does nothing; the fallback of last resort
pub struct NullPlugin;

impl TimelinePlugin for NullPlugin {
    fn start(&mut self, _event: &TimelineEvent) {}
    fn end(&mut self, _event: &TimelineEvent) {}
    fn update(&mut self, _changes: NestedUpdate) {}
    fn teardown(&mut self) {}
}

/// Registry of fallback factories, keyed by plugin name
///
/// The empty-string key is the catch-all fallback for any plugin without
/// its own entry.
pub struct CompatGate {
    fallbacks: Mutex<HashMap<String, PluginFactory>>,
}

impl CompatGate {
    pub fn new() -> Self {
        Self {
            fallbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fallback for one plugin name (or `""` for all)
    pub fn register_fallback(&self, name: impl Into<String>, factory: PluginFactory) {
        self.fallbacks.lock().insert(name.into(), factory);
    }

    fn fallback_for(&self, name: &str) -> Box<dyn TimelinePlugin> {
        let fallbacks = self.fallbacks.lock();
        if let Some(factory) = fallbacks.get(name).or_else(|| fallbacks.get("")) {
            factory()
        } else {
            Box::new(NullPlugin)
        }
    }

    /// Instantiate `factory`, unless the probe reports the environment
    /// incompatible, in which case the registered fallback is substituted
    pub fn instantiate(
        &self,
        name: &str,
        probe: Option<&IncompatibilityProbe>,
        factory: PluginFactory,
    ) -> Box<dyn TimelinePlugin> {
        if let Some(probe) = probe {
            if let Some(reason) = probe() {
                warn!(plugin = name, reason = %reason, "plugin incompatible, using fallback");
                return self.fallback_for(name);
            }
        }
        factory()
    }
}

impl Default for CompatGate {
    fn default() -> Self {
        Self::new()
    }
}
