//! Adapter event model
//!
//! The named event set follows the standard media-element vocabulary so
//! hosts can subscribe with the names they already know. Dispatch is always
//! routed through the [`Scheduler`] port with zero delay: an event is never
//! observable before the call that triggered it has returned.

use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Named adapter events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaEventKind {
    LoadStart,
    Progress,
    Abort,
    Emptied,
    Stalled,
    DurationChange,
    LoadedMetadata,
    LoadedData,
    CanPlay,
    CanPlayThrough,
    Play,
    Playing,
    Pause,
    Waiting,
    Seeking,
    Seeked,
    TimeUpdate,
    Ended,
    RateChange,
    VolumeChange,
    Error,
    PlaybackQualityChange,
}

impl MediaEventKind {
    /// The standard lowercase event name
    pub fn as_str(self) -> &'static str {
        match self {
            MediaEventKind::LoadStart => "loadstart",
            MediaEventKind::Progress => "progress",
            MediaEventKind::Abort => "abort",
            MediaEventKind::Emptied => "emptied",
            MediaEventKind::Stalled => "stalled",
            MediaEventKind::DurationChange => "durationchange",
            MediaEventKind::LoadedMetadata => "loadedmetadata",
            MediaEventKind::LoadedData => "loadeddata",
            MediaEventKind::CanPlay => "canplay",
            MediaEventKind::CanPlayThrough => "canplaythrough",
            MediaEventKind::Play => "play",
            MediaEventKind::Playing => "playing",
            MediaEventKind::Pause => "pause",
            MediaEventKind::Waiting => "waiting",
            MediaEventKind::Seeking => "seeking",
            MediaEventKind::Seeked => "seeked",
            MediaEventKind::TimeUpdate => "timeupdate",
            MediaEventKind::Ended => "ended",
            MediaEventKind::RateChange => "ratechange",
            MediaEventKind::VolumeChange => "volumechange",
            MediaEventKind::Error => "error",
            MediaEventKind::PlaybackQualityChange => "playbackqualitychange",
        }
    }
}

impl std::fmt::Display for MediaEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle for removing a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(MediaEventKind) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    filter: Option<MediaEventKind>,
    callback: Listener,
}

struct TargetInner {
    next_id: u64,
    listeners: Vec<ListenerEntry>,
}

/// Listener registry with scheduler-deferred dispatch
///
/// Cheap to clone; clones share the listener list. Listener callbacks run
/// on the scheduler's turn with no adapter locks held, so they are free to
/// call back into the adapter.
#[derive(Clone)]
pub struct EventTarget {
    inner: Arc<Mutex<TargetInner>>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TargetInner {
                next_id: 1,
                listeners: Vec::new(),
            })),
        }
    }

    fn register(&self, filter: Option<MediaEventKind>, callback: Listener) -> ListenerId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push(ListenerEntry { id, filter, callback });
        ListenerId(id)
    }

    /// Subscribe to one event kind
    pub fn on<F>(&self, kind: MediaEventKind, callback: F) -> ListenerId
    where
        F: Fn(MediaEventKind) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(callback))
    }

    /// Subscribe to every event (event loggers, relays)
    pub fn on_all<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(MediaEventKind) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(callback))
    }

    /// Remove a listener; unknown ids are ignored
    pub fn off(&self, id: ListenerId) {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.listeners.iter().position(|l| l.id == id.0) {
            inner.listeners.remove(pos);
        }
    }

    /// Dispatch a single event on the next scheduler turn
    pub fn dispatch(&self, scheduler: &dyn Scheduler, kind: MediaEventKind) {
        self.dispatch_burst(scheduler, vec![kind]);
    }

    /// Dispatch an ordered burst of events as one scheduler turn
    ///
    /// Keeping a burst in one deferred task guarantees the documented
    /// intra-burst order even when other work is interleaved.
    pub fn dispatch_burst(&self, scheduler: &dyn Scheduler, kinds: Vec<MediaEventKind>) {
        if kinds.is_empty() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        scheduler.defer(Box::new(move || {
            for kind in kinds {
                let callbacks: Vec<Listener> = {
                    let inner = inner.lock();
                    inner
                        .listeners
                        .iter()
                        .filter(|l| l.filter.is_none() || l.filter == Some(kind))
                        .map(|l| Arc::clone(&l.callback))
                        .collect()
                };
                for callback in callbacks {
                    callback(kind);
                }
            }
        }));
    }
}

impl Default for EventTarget {
    fn default() -> Self {
        Self::new()
    }
}
