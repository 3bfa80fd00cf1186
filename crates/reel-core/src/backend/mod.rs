//! Playback backends
//!
//! A closed set of backend kinds behind one trait: the native in-process
//! element, a wrapped third-party player library, and a remote
//! message-driven embedded player. Each implementation owns the
//! backend-specific translation (the "bridge") between the external
//! player's notification model and the adapter's state machine.

pub mod library;
pub mod native;
pub mod remote;

use crate::adapter::BridgeLink;
use crate::ready_queue::DeferredKey;
use crate::source::Source;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub use library::{LibraryPlayer, SharedLibraryPlayer};
pub use native::MetadataProbe;
pub use remote::{RemoteEvent, RemotePlayer, RemotePlayerState, SharedRemotePlayer};

/// The registered backend kinds, in no particular preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process playback element owned by the adapter
    Native,
    /// Wrapped third-party player library
    Library,
    /// Remote iframe-embedded player driven over messaging
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::Library => write!(f, "library"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(BackendKind::Native),
            "library" => Ok(BackendKind::Library),
            "remote" => Ok(BackendKind::Remote),
            other => Err(crate::error::Error::UnknownBackendKind(other.to_string())),
        }
    }
}

/// Identity of one backend binding
///
/// Regenerated on every rebind; callbacks carry the id they were created
/// under and no-op once it no longer matches, so a replaced backend can
/// never mutate current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(Uuid);

impl BindingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller intent pushed onto a backend, possibly via the readiness queue
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Play,
    Pause,
    Seek(f64),
    SetVolume(f64),
    SetMuted(bool),
    SetQuality(String),
}

impl BackendCommand {
    /// Dedup key: only the latest queued command per key survives
    pub fn key(&self) -> Option<DeferredKey> {
        Some(match self {
            BackendCommand::Play => "play",
            BackendCommand::Pause => "pause",
            BackendCommand::Seek(_) => "seek",
            BackendCommand::SetVolume(_) => "volume",
            BackendCommand::SetMuted(_) => "muted",
            BackendCommand::SetQuality(_) => "quality",
        })
    }
}

/// Point-in-time read of the backend's playback fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackSnapshot {
    pub position: f64,
    pub duration: f64,
    pub buffered_end: f64,
    pub volume: f64,
    pub muted: bool,
}

/// An external player instance that already exists in the host
///
/// Adopted players are never destroyed by the adapter; teardown only
/// detaches listeners.
#[derive(Clone)]
pub enum ExistingPlayer {
    Library(SharedLibraryPlayer),
    Remote(SharedRemotePlayer),
}

impl ExistingPlayer {
    pub fn kind(&self) -> BackendKind {
        match self {
            ExistingPlayer::Library(_) => BackendKind::Library,
            ExistingPlayer::Remote(_) => BackendKind::Remote,
        }
    }
}

struct ContainerInner {
    id: String,
    existing: parking_lot::Mutex<Option<ExistingPlayer>>,
}

/// Host-owned mount point for one backend at a time
///
/// Element creation and styling belong to the host; the adapter only
/// tracks exclusive ownership of the slot and any pre-existing player the
/// host asks it to adopt.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id: id.into(),
                existing: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// A container that already holds a live external player to adopt
    pub fn with_existing(id: impl Into<String>, existing: ExistingPlayer) -> Self {
        let container = Self::new(id);
        *container.inner.existing.lock() = Some(existing);
        container
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn existing(&self) -> Option<ExistingPlayer> {
        self.inner.existing.lock().clone()
    }

    pub fn existing_kind(&self) -> Option<BackendKind> {
        self.inner.existing.lock().as_ref().map(|e| e.kind())
    }
}

impl From<&str> for Container {
    fn from(id: &str) -> Self {
        Container::new(id)
    }
}

/// One concrete backend bound to an adapter
///
/// `destroy` is best-effort: implementations swallow and log faults from
/// the external player rather than propagate them.
pub trait MediaBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Wire the backend's notifications into the adapter
    fn attach(&mut self, link: BridgeLink);

    /// Remove listeners and clear all timers owned by this binding
    fn detach(&mut self);

    fn is_ready(&self) -> bool;

    /// Begin loading from the candidate list
    fn load(&mut self, sources: &[Source]);

    /// Apply caller intent; only called when the backend is ready
    fn command(&mut self, command: BackendCommand);

    fn snapshot(&self) -> PlaybackSnapshot;

    /// Release the external player (no-op beyond detach for adopted ones)
    fn destroy(&mut self);

    /// Current playback quality label, for backends that expose one
    fn playback_quality(&self) -> Option<String> {
        None
    }

    fn available_quality_levels(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parses_case_insensitively() {
        assert_eq!("Remote".parse::<BackendKind>().unwrap(), BackendKind::Remote);
        assert!("webgl".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_command_keys_dedup_by_operation() {
        assert_eq!(BackendCommand::Seek(1.0).key(), BackendCommand::Seek(9.0).key());
        assert_ne!(BackendCommand::Play.key(), BackendCommand::Pause.key());
    }

    #[test]
    fn test_binding_ids_are_unique() {
        assert_ne!(BindingId::new(), BindingId::new());
    }
}
