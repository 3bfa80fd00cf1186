//! Backend registry and capability resolution
//!
//! An explicit, ordered collection of backend registrations, handed to the
//! resolver rather than consulted as ambient global state. Resolution runs
//! at construction and again on every source reassignment, because nested
//! playback swaps source types at runtime.

use crate::backend::{BackendKind, Container, MediaBackend};
use crate::config::AdapterConfig;
use crate::error::Result;
use crate::source::{CanPlay, Source};
use std::sync::Arc;
use tracing::debug;

type CapabilityTypeFn = Arc<dyn Fn(&str) -> CanPlay + Send + Sync>;
type CapabilitySourceFn = Arc<dyn Fn(&Source) -> CanPlay + Send + Sync>;
type ClaimsExistingFn = Arc<dyn Fn(&Container) -> bool + Send + Sync>;
type ConstructFn =
    Arc<dyn Fn(&Container, &AdapterConfig) -> Result<Box<dyn MediaBackend>> + Send + Sync>;

/// One registered backend kind
#[derive(Clone)]
pub struct Registration {
    pub kind: BackendKind,
    pub can_play_type: CapabilityTypeFn,
    pub can_play_source: CapabilitySourceFn,
    pub claims_existing: ClaimsExistingFn,
    pub construct: ConstructFn,
}

impl Registration {
    /// Capability answer for a candidate list: best answer for any entry
    pub fn can_play_sources(&self, sources: &[Source]) -> CanPlay {
        let mut best = CanPlay::Empty;
        for source in sources {
            match (self.can_play_source)(source) {
                CanPlay::Probably => return CanPlay::Probably,
                CanPlay::Maybe => best = CanPlay::Maybe,
                CanPlay::Empty => {}
            }
        }
        best
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("kind", &self.kind).finish()
    }
}

/// Ordered backend registrations; order is the preference order
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entries: Vec<Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register(&mut self, registration: Registration) {
        self.entries.push(registration);
    }

    pub fn entries(&self) -> &[Registration] {
        &self.entries
    }

    pub fn entry_for(&self, kind: BackendKind) -> Option<&Registration> {
        self.entries.iter().find(|r| r.kind == kind)
    }

    /// Pick the backend kind that can play the given sources
    ///
    /// An existing player already bound to the container wins regardless of
    /// source. Otherwise, for each candidate source in order, the first
    /// registration answering positively is chosen. `None` means the caller
    /// must surface an unsupported-source error.
    pub fn resolve(&self, container: &Container, sources: &[Source]) -> Option<&Registration> {
        if let Some(adopter) = self.entries.iter().find(|r| (r.claims_existing)(container)) {
            debug!(kind = %adopter.kind, "adopting existing player");
            return Some(adopter);
        }
        for source in sources {
            for registration in &self.entries {
                if (registration.can_play_source)(source).is_positive() {
                    debug!(kind = %registration.kind, url = %source.url, "resolved backend");
                    return Some(registration);
                }
            }
        }
        None
    }

    /// Module-level capability query across all registrations
    pub fn can_play_type(&self, mime_type: &str) -> CanPlay {
        let mut best = CanPlay::Empty;
        for registration in &self.entries {
            match (registration.can_play_type)(mime_type) {
                CanPlay::Probably => return CanPlay::Probably,
                CanPlay::Maybe => best = CanPlay::Maybe,
                CanPlay::Empty => {}
            }
        }
        best
    }

    /// Module-level capability query for a source descriptor list
    pub fn can_play_sources(&self, sources: &[Source]) -> CanPlay {
        let mut best = CanPlay::Empty;
        for registration in &self.entries {
            match registration.can_play_sources(sources) {
                CanPlay::Probably => return CanPlay::Probably,
                CanPlay::Maybe => best = CanPlay::Maybe,
                CanPlay::Empty => {}
            }
        }
        best
    }
}
