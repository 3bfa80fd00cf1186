//! Reel Nested - Nested Playback Synchronizer
//!
//! Composes two media adapters so that a nested playback timeline stays
//! phase-locked to a parent timeline:
//! - implements the host's four plugin lifecycle hooks
//!   (`start`/`end`/`update`/`teardown`)
//! - mirrors parent play/pause/seek (and optionally volume) into the
//!   nested adapter with the window-offset formula and drift correction
//! - re-resolves the nested backend whenever the source changes, swapping
//!   in place for the same kind and rebuilding only across kinds
//! - carries nested sub-behaviors (captions, overlays) diffed across
//!   updates, and a compatibility gate substituting fallbacks where the
//!   environment cannot run the plugin at all

pub mod behavior;
pub mod compat;
pub mod options;
pub mod plugin;
pub mod session;

use reel_core::{AdapterConfig, Container, Registry, Scheduler};
use std::sync::Arc;
use url::Url;

pub use behavior::{BehaviorFactory, BehaviorRegistry, NestedBehavior};
pub use compat::{CompatGate, IncompatibilityProbe, NullPlugin, PluginFactory};
pub use options::{
    parse_timecode, NestedEventDescriptor, NestedOptions, NestedUpdate, VolumePolicy,
};
pub use plugin::{TimelineEvent, TimelinePlugin};
pub use session::NestedSession;

/// Host-provided wiring for nested sessions
///
/// The registry is passed explicitly (never ambient); `base_url` anchors
/// relative source URLs for the source-equivalence check.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<Registry>,
    pub scheduler: Arc<dyn Scheduler>,
    pub container: Container,
    pub base_url: Url,
    pub behaviors: Arc<BehaviorRegistry>,
    pub config: AdapterConfig,
}

impl SessionContext {
    pub fn new(
        registry: Arc<Registry>,
        scheduler: Arc<dyn Scheduler>,
        container: Container,
        base_url: Url,
    ) -> Self {
        Self {
            registry,
            scheduler,
            container,
            base_url,
            behaviors: Arc::new(BehaviorRegistry::new()),
            config: AdapterConfig::default(),
        }
    }

    pub fn with_behaviors(mut self, behaviors: Arc<BehaviorRegistry>) -> Self {
        self.behaviors = behaviors;
        self
    }

    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
