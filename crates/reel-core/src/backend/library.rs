//! Wrapped-library bridge
//!
//! Backend for third-party player libraries that expose named events and
//! getter/setter methods. The bridge maps the library's events 1:1 onto
//! adapter events; each mapping carries its own predicate deciding whether
//! internal state also mutates (a `durationchange` resolves play/playing/
//! pause events parked while the duration was unknown, a `volumechange`
//! diffs volume and mute, `progress` advances the readiness ladder and
//! feeds the stall monitor).
//!
//! External players implement [`LibraryPlayer`]. Event delivery must be
//! asynchronous: a player must never invoke the handler from inside one of
//! its own command methods, or it would observe half-applied state.

use crate::adapter::BridgeLink;
use crate::backend::{
    BackendCommand, BackendKind, Container, ExistingPlayer, MediaBackend, PlaybackSnapshot,
};
use crate::error::{MediaError, MediaErrorCode, Result};
use crate::scheduler::TimerId;
use crate::source::{mime_of, Source};
use crate::state::{EndedDisposition, ProgressDisposition, ReadyState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Handler invoked by the player with its native event names
pub type LibraryEventHandler = Box<dyn FnMut(&str) + Send>;

/// Boundary trait for a wrapped player library instance
pub trait LibraryPlayer: Send {
    /// Install the single event handler; replaces any previous one
    fn set_event_handler(&mut self, handler: LibraryEventHandler);

    fn clear_event_handler(&mut self);

    /// Invoke `callback` once the player has finished initializing; runs
    /// immediately if it already has
    fn when_ready(&mut self, callback: Box<dyn FnOnce() + Send>);

    fn load(&mut self, url: &str);

    fn play(&mut self);
    fn pause(&mut self);

    fn position(&self) -> f64;
    fn set_position(&mut self, time: f64);

    /// Reported duration; zero until the library has metadata
    fn duration(&self) -> f64;

    fn buffered_end(&self) -> f64;

    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);

    fn muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);

    /// Last error as a standard numeric code plus message, if any
    fn error(&self) -> Option<(u32, String)>;

    /// Release the player; faults are reported, never thrown further
    fn destroy(&mut self) -> std::result::Result<(), String>;
}

/// Shared handle to a library player instance
pub type SharedLibraryPlayer = Arc<Mutex<Box<dyn LibraryPlayer>>>;

/// Constructor for fresh library players bound to a container
pub type LibraryPlayerFactory =
    Arc<dyn Fn(&Container) -> Result<SharedLibraryPlayer> + Send + Sync>;

const LIBRARY_MIMES: &[&str] = &[
    "video/mp4",
    "video/m4v",
    "video/webm",
    "video/ogg",
    "video/flv",
    "video/x-library",
];

fn library_can_play_mime(mime: &str) -> bool {
    LIBRARY_MIMES.contains(&mime)
}

fn map_error(code: u32, message: String) -> MediaError {
    let code = match code {
        1 => MediaErrorCode::Aborted,
        2 => MediaErrorCode::Network,
        3 => MediaErrorCode::Decode,
        4 => MediaErrorCode::SrcNotSupported,
        _ => MediaErrorCode::Unknown,
    };
    MediaError::new(message, code)
}

/// Re-arm the 3-second silence window; fires `stalled` when no progress
/// lands before it elapses
fn arm_stall_monitor(link: &BridgeLink, slot: &Arc<Mutex<Option<TimerId>>>) {
    let cb_link = link.clone();
    let cb_slot = Arc::clone(slot);
    let mut guard = slot.lock();
    if let Some(old) = guard.take() {
        link.scheduler().cancel(old);
    }
    *guard = Some(link.scheduler().after(
        link.config().stall_timeout,
        Box::new(move || {
            let mut fired = false;
            cb_link.update(|state, out| {
                fired = state.note_stalled(out);
            });
            if !fired && cb_link.is_current() {
                arm_stall_monitor(&cb_link, &cb_slot);
            }
        }),
    ));
}

fn clear_stall_monitor(link: &BridgeLink, slot: &Arc<Mutex<Option<TimerId>>>) {
    if let Some(timer) = slot.lock().take() {
        link.scheduler().cancel(timer);
    }
}

/// The per-event predicate table
fn handle_player_event(
    name: &str,
    player: &SharedLibraryPlayer,
    link: &BridgeLink,
    stall: &Arc<Mutex<Option<TimerId>>>,
) {
    use crate::events::MediaEventKind as Ev;

    if !link.is_current() {
        return;
    }

    match name {
        "durationchange" | "loadedmetadata" => {
            let duration = player.lock().duration();
            link.update(|state, out| {
                state.resolve_duration(duration, out);
            });
        }
        "progress" => {
            let (duration, buffered_end, position) = {
                let player = player.lock();
                (player.duration(), player.buffered_end(), player.position())
            };
            let mut disposition = ProgressDisposition::Loading;
            link.update(|state, out| {
                if !state.has_duration() {
                    state.resolve_duration(duration, out);
                }
                disposition = state.note_progress(buffered_end.max(position), out);
                out.push(Ev::Progress);
            });
            match disposition {
                ProgressDisposition::Loading => arm_stall_monitor(link, stall),
                ProgressDisposition::Complete => clear_stall_monitor(link, stall),
            }
        }
        "stalled" => {
            let mut fired = false;
            link.update(|state, out| {
                fired = state.note_stalled(out);
            });
            if !fired {
                arm_stall_monitor(link, stall);
            }
        }
        "waiting" => link.dispatch(Ev::Waiting),
        "ratechange" => link.dispatch(Ev::RateChange),
        "abort" => link.dispatch(Ev::Abort),
        "timeupdate" => {
            let position = player.lock().position();
            link.update(|state, out| {
                state.current_time = position;
                out.push(Ev::TimeUpdate);
            });
        }
        "volumechange" => {
            let (volume, muted) = {
                let player = player.lock();
                (player.volume(), player.muted())
            };
            link.update(|state, out| state.sync_volume_from_backend(volume, muted, out));
        }
        "canplay" => {
            let duration = player.lock().duration();
            link.update(|state, out| {
                if !state.has_duration() {
                    state.resolve_duration(duration, out);
                }
                state.set_ready_state(ReadyState::HaveCurrentData, out);
                state.set_ready_state(ReadyState::HaveFutureData, out);
            });
        }
        "canplaythrough" => {
            link.update(|state, out| state.set_ready_state(ReadyState::HaveEnoughData, out));
        }
        "play" => link.update(|state, out| state.note_play(out)),
        "playing" => {
            let duration = player.lock().duration();
            link.update(|state, out| {
                if !state.has_duration() {
                    state.resolve_duration(duration, out);
                }
                state.note_playing(out);
            });
        }
        "seeking" => link.update(|state, out| state.begin_seek(out)),
        "seeked" => {
            let position = player.lock().position();
            link.update(|state, out| {
                state.current_time = position;
                state.complete_seek(out);
            });
        }
        "pause" => link.update(|state, out| state.note_pause(out)),
        "ended" => {
            let mut restart = false;
            link.update(|state, out| {
                restart = state.note_ended(out) == EndedDisposition::Restart;
            });
            if restart {
                link.command_backend(BackendCommand::Seek(0.0));
                link.command_backend(BackendCommand::Play);
            }
        }
        "error" => {
            let reported = player.lock().error();
            let (code, message) =
                reported.unwrap_or((MediaErrorCode::Unknown.as_u32(), "Playback error".into()));
            link.update(|state, out| state.fail(map_error(code, message), out));
        }
        other => {
            debug!(event = other, "unmapped library event");
        }
    }
}

/// Bridge over a [`LibraryPlayer`]
pub struct LibraryBackend {
    player: SharedLibraryPlayer,
    adopted: bool,
    link: Option<BridgeLink>,
    ready: Arc<AtomicBool>,
    stall: Arc<Mutex<Option<TimerId>>>,
}

impl LibraryBackend {
    pub fn new(player: SharedLibraryPlayer) -> Self {
        Self::build(player, false)
    }

    /// Wrap a player that already existed in the host; the adapter will
    /// detach from it on teardown but never destroy it
    pub fn adopt(player: SharedLibraryPlayer) -> Self {
        Self::build(player, true)
    }

    fn build(player: SharedLibraryPlayer, adopted: bool) -> Self {
        Self {
            player,
            adopted,
            link: None,
            ready: Arc::new(AtomicBool::new(false)),
            stall: Arc::new(Mutex::new(None)),
        }
    }
}

impl MediaBackend for LibraryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Library
    }

    fn attach(&mut self, link: BridgeLink) {
        let weak: Weak<Mutex<Box<dyn LibraryPlayer>>> = Arc::downgrade(&self.player);
        let handler_link = link.clone();
        let handler_stall = Arc::clone(&self.stall);
        self.player.lock().set_event_handler(Box::new(move |name| {
            let Some(player) = weak.upgrade() else { return };
            handle_player_event(name, &player, &handler_link, &handler_stall);
        }));

        let ready = Arc::clone(&self.ready);
        let ready_link = link.clone();
        let ready_stall = Arc::clone(&self.stall);
        self.player.lock().when_ready(Box::new(move || {
            // A readiness callback for a binding that has been replaced
            // mid-flight must not touch anything.
            if !ready_link.is_current() {
                return;
            }
            ready.store(true, Ordering::SeqCst);
            arm_stall_monitor(&ready_link, &ready_stall);
            ready_link.mark_ready();
        }));

        self.link = Some(link);
    }

    fn detach(&mut self) {
        if let Some(link) = &self.link {
            clear_stall_monitor(link, &self.stall);
        }
        self.player.lock().clear_event_handler();
        self.link = None;
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn load(&mut self, sources: &[Source]) {
        let chosen = sources
            .iter()
            .find(|s| mime_of(s).map(library_can_play_mime).unwrap_or(false))
            .or_else(|| sources.first());
        if let Some(source) = chosen {
            debug!(url = %source.url, "library player loading");
            self.player.lock().load(&source.url);
        }
    }

    fn command(&mut self, command: BackendCommand) {
        let mut player = self.player.lock();
        match command {
            BackendCommand::Play => player.play(),
            BackendCommand::Pause => player.pause(),
            BackendCommand::Seek(time) => player.set_position(time),
            BackendCommand::SetVolume(volume) => player.set_volume(volume),
            BackendCommand::SetMuted(muted) => player.set_muted(muted),
            BackendCommand::SetQuality(_) => {}
        }
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        let player = self.player.lock();
        PlaybackSnapshot {
            position: player.position(),
            duration: player.duration(),
            buffered_end: player.buffered_end(),
            volume: player.volume(),
            muted: player.muted(),
        }
    }

    fn destroy(&mut self) {
        self.detach();
        self.ready.store(false, Ordering::SeqCst);
        if self.adopted {
            return;
        }
        let mut player = self.player.lock();
        player.pause();
        if let Err(fault) = player.destroy() {
            // Teardown is best-effort by contract.
            debug!(fault = %fault, "library player destroy fault swallowed");
        }
    }
}

/// Register the wrapped-library kind
pub fn registration(factory: LibraryPlayerFactory) -> crate::registry::Registration {
    use crate::registry::Registration;
    use crate::source::CanPlay;

    Registration {
        kind: BackendKind::Library,
        can_play_type: Arc::new(|mime| {
            if library_can_play_mime(mime) {
                CanPlay::Probably
            } else {
                CanPlay::Empty
            }
        }),
        can_play_source: Arc::new(|source| match mime_of(source) {
            Some(mime) if library_can_play_mime(mime) => CanPlay::Probably,
            _ => CanPlay::Empty,
        }),
        claims_existing: Arc::new(|container| {
            matches!(container.existing(), Some(ExistingPlayer::Library(_)))
        }),
        construct: Arc::new(move |container, _config| {
            if let Some(ExistingPlayer::Library(player)) = container.existing() {
                return Ok(Box::new(LibraryBackend::adopt(player)));
            }
            let player = factory(container)?;
            Ok(Box::new(LibraryBackend::new(player)))
        }),
    }
}
