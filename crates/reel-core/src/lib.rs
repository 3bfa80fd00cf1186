//! Reel Core - Media Adapter Library
//!
//! This crate normalizes heterogeneous, asynchronously-initializing
//! playback backends behind one synchronous-looking media surface:
//! - Standard state fields (readyState, networkState, currentTime,
//!   duration, paused, volume, muted, error) and event sequence
//! - A deferred readiness queue so callers can issue commands before the
//!   backend has initialized
//! - Per-backend bridges translating native notification models into the
//!   state machine (wrapped player libraries, remote embedded players,
//!   and a native in-process element)
//! - Capability resolution picking the backend kind for a source, re-run
//!   on every source change
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Reel Core                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌───────────┐   ┌────────────┐   ┌──────────────────────┐  │
//! │  │ Registry/ │   │  Readiness │   │   State Machine      │  │
//! │  │ Resolver  │   │   Queue    │   │   + Event Bursts     │  │
//! │  └─────┬─────┘   └─────┬──────┘   └──────────┬───────────┘  │
//! │        │               │                     │              │
//! │        └───────────────┼─────────────────────┘              │
//! │                        │                                    │
//! │                 ┌──────┴──────┐                             │
//! │                 │   Media     │                             │
//! │                 │   Adapter   │                             │
//! │                 └──────┬──────┘                             │
//! │                        │                                    │
//! │   ┌───────────┐  ┌─────┴─────┐  ┌─────────────┐             │
//! │   │  Native   │  │  Library  │  │   Remote    │             │
//! │   │  Element  │  │  Bridge   │  │   Bridge    │             │
//! │   └───────────┘  └───────────┘  └─────────────┘             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod ready_queue;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod state;
pub mod testing;

pub use adapter::{create_adapter, BridgeLink, MediaAdapter};
pub use backend::{
    BackendCommand, BackendKind, BindingId, Container, ExistingPlayer, LibraryPlayer,
    MediaBackend, PlaybackSnapshot, RemoteEvent, RemotePlayer, RemotePlayerState,
};
pub use config::AdapterConfig;
pub use error::{Error, MediaError, MediaErrorCode, Result};
pub use events::{EventTarget, ListenerId, MediaEventKind};
pub use ready_queue::{ReadyQueue, Scheduled};
pub use registry::{Registration, Registry};
pub use scheduler::{ManualScheduler, Scheduler, TimerId, TokioScheduler};
pub use source::{CanPlay, MediaKind, Source, TrimFragment};
pub use state::{MediaState, NetworkState, Preload, ReadyState, TimeRanges};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
