//! Native in-process playback element
//!
//! The passthrough backend: an element owned by the adapter itself, driven
//! entirely by the scheduler clock. Hosts use it for local media the
//! platform can decode directly; the test suites use it as the reference
//! implementation of the media contract.
//!
//! Metadata comes from an injectable [`MetadataProbe`] so embedders decide
//! how durations are discovered (container parsing, sidecar data, fixed
//! values in tests).

use crate::adapter::BridgeLink;
use crate::backend::{BackendCommand, BackendKind, MediaBackend, PlaybackSnapshot};
use crate::error::MediaError;
use crate::events::MediaEventKind;
use crate::scheduler::TimerId;
use crate::source::{mime_of, Source};
use crate::state::EndedDisposition;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Duration discovery hook for native playback
pub type MetadataProbe = Arc<dyn Fn(&Source) -> Option<f64> + Send + Sync>;

/// A probe that reports the same duration for every playable source
pub fn fixed_duration(duration: f64) -> MetadataProbe {
    Arc::new(move |_| Some(duration))
}

#[derive(Debug)]
struct NativeShared {
    ready: bool,
    position: f64,
    duration: f64,
    buffered_end: f64,
    playing: bool,
    volume: f64,
    muted: bool,
    timeupdate_timer: Option<TimerId>,
    progress_timer: Option<TimerId>,
}

impl NativeShared {
    fn new() -> Self {
        Self {
            ready: false,
            position: 0.0,
            duration: f64::NAN,
            buffered_end: 0.0,
            playing: false,
            volume: 1.0,
            muted: false,
            timeupdate_timer: None,
            progress_timer: None,
        }
    }
}

/// Scheduler-clock-driven playback element
pub struct NativeBackend {
    probe: MetadataProbe,
    link: Option<BridgeLink>,
    shared: Arc<Mutex<NativeShared>>,
}

impl NativeBackend {
    pub fn new(probe: MetadataProbe) -> Self {
        Self {
            probe,
            link: None,
            shared: Arc::new(Mutex::new(NativeShared::new())),
        }
    }

    fn cancel_timers(&self) {
        let Some(link) = &self.link else { return };
        let mut shared = self.shared.lock();
        for timer in [shared.timeupdate_timer.take(), shared.progress_timer.take()]
            .into_iter()
            .flatten()
        {
            link.scheduler().cancel(timer);
        }
    }
}

/// Simulated buffering: each tick extends the buffered range by a quarter
/// of the resource until everything is buffered
fn start_progress(shared: &Arc<Mutex<NativeShared>>, link: &BridgeLink) {
    let tick_shared = Arc::clone(shared);
    let tick_link = link.clone();
    let timer = link.scheduler().every(
        link.config().buffered_poll,
        Box::new(move || {
            let (buffered_end, done) = {
                let mut shared = tick_shared.lock();
                let duration = shared.duration;
                if duration.is_nan() {
                    return;
                }
                shared.buffered_end = (shared.buffered_end + duration / 4.0).min(duration);
                (shared.buffered_end, shared.buffered_end >= duration)
            };
            tick_link.update(|state, out| {
                state.note_progress(buffered_end, out);
                out.push(MediaEventKind::Progress);
            });
            if done {
                let mut shared = tick_shared.lock();
                if let Some(timer) = shared.progress_timer.take() {
                    tick_link.scheduler().cancel(timer);
                }
            }
        }),
    );
    shared.lock().progress_timer = Some(timer);
}

/// Playback clock: advances the position every timeupdate interval and
/// handles end-of-resource (pause+ended, or a silent loop restart)
fn start_clock(shared: &Arc<Mutex<NativeShared>>, link: &BridgeLink) {
    {
        let shared = shared.lock();
        if shared.timeupdate_timer.is_some() {
            return;
        }
    }
    let period = link.config().timeupdate_interval;
    let step = period.as_secs_f64();
    let tick_shared = Arc::clone(shared);
    let tick_link = link.clone();
    let timer = link.scheduler().every(
        period,
        Box::new(move || {
            let (position, finished) = {
                let mut shared = tick_shared.lock();
                if !shared.playing {
                    return;
                }
                shared.position += step;
                let duration = shared.duration;
                if !duration.is_nan() && shared.position >= duration {
                    shared.position = duration;
                    (duration, true)
                } else {
                    (shared.position, false)
                }
            };
            if !finished {
                tick_link.update(|state, out| {
                    state.current_time = position;
                    out.push(MediaEventKind::TimeUpdate);
                });
                return;
            }
            let mut restarted = false;
            tick_link.update(|state, out| {
                state.current_time = position;
                out.push(MediaEventKind::TimeUpdate);
                if state.loop_ {
                    restarted = state.note_ended(out) == EndedDisposition::Restart;
                } else {
                    state.note_pause(out);
                    state.note_ended(out);
                }
            });
            let mut shared = tick_shared.lock();
            if restarted {
                shared.position = 0.0;
            } else {
                shared.playing = false;
                if let Some(timer) = shared.timeupdate_timer.take() {
                    tick_link.scheduler().cancel(timer);
                }
            }
        }),
    );
    shared.lock().timeupdate_timer = Some(timer);
}

impl MediaBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn attach(&mut self, link: BridgeLink) {
        self.link = Some(link);
    }

    fn detach(&mut self) {
        self.cancel_timers();
        self.link = None;
    }

    fn is_ready(&self) -> bool {
        self.shared.lock().ready
    }

    fn load(&mut self, sources: &[Source]) {
        let Some(link) = self.link.clone() else { return };
        let source = sources
            .iter()
            .find(|s| mime_of(s).is_some())
            .or_else(|| sources.first())
            .cloned();
        let Some(source) = source else { return };

        // The element exists as soon as the source is attached; readiness
        // is only deferred past the current call stack.
        let ready_shared = Arc::clone(&self.shared);
        let ready_link = link.clone();
        link.scheduler().defer(Box::new(move || {
            if !ready_link.is_current() {
                return;
            }
            ready_shared.lock().ready = true;
            ready_link.mark_ready();
        }));

        let metadata = (self.probe)(&source);
        debug!(url = %source.url, duration = ?metadata, "native element loading");
        let meta_shared = Arc::clone(&self.shared);
        let meta_link = link.clone();
        link.scheduler().defer(Box::new(move || {
            if !meta_link.is_current() {
                return;
            }
            match metadata {
                Some(duration) if duration > 0.0 => {
                    meta_shared.lock().duration = duration;
                    let mut should_autoplay = false;
                    meta_link.update(|state, out| {
                        state.resolve_duration(duration, out);
                        should_autoplay = state.autoplay && state.paused;
                    });
                    start_progress(&meta_shared, &meta_link);
                    if should_autoplay {
                        meta_link.command_backend(BackendCommand::Play);
                    }
                }
                _ => {
                    meta_link.update(|state, out| {
                        state.fail(MediaError::src_not_supported(), out);
                    });
                }
            }
        }));
    }

    fn command(&mut self, command: BackendCommand) {
        let Some(link) = self.link.clone() else { return };
        match command {
            BackendCommand::Play => {
                {
                    let mut shared = self.shared.lock();
                    if shared.playing {
                        return;
                    }
                    shared.playing = true;
                }
                link.update(|state, out| {
                    state.note_play(out);
                    state.note_playing(out);
                });
                start_clock(&self.shared, &link);
            }
            BackendCommand::Pause => {
                {
                    let mut shared = self.shared.lock();
                    if !shared.playing {
                        return;
                    }
                    shared.playing = false;
                }
                link.update(|state, out| state.note_pause(out));
            }
            BackendCommand::Seek(time) => {
                let target = {
                    let mut shared = self.shared.lock();
                    let clamped = if shared.duration.is_nan() {
                        time.max(0.0)
                    } else {
                        time.clamp(0.0, shared.duration)
                    };
                    shared.position = clamped;
                    clamped
                };
                link.update(|state, out| state.begin_seek(out));
                let settle = link.clone();
                link.scheduler().defer(Box::new(move || {
                    settle.update(|state, out| {
                        state.current_time = target;
                        state.ended = false;
                        state.complete_seek(out);
                    });
                }));
            }
            BackendCommand::SetVolume(volume) => {
                self.shared.lock().volume = volume;
            }
            BackendCommand::SetMuted(muted) => {
                self.shared.lock().muted = muted;
            }
            BackendCommand::SetQuality(_) => {}
        }
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        let shared = self.shared.lock();
        PlaybackSnapshot {
            position: shared.position,
            duration: shared.duration,
            buffered_end: shared.buffered_end,
            volume: shared.volume,
            muted: shared.muted,
        }
    }

    fn destroy(&mut self) {
        self.cancel_timers();
        let mut shared = self.shared.lock();
        shared.ready = false;
        shared.playing = false;
    }
}

/// Register native playback: claims any source whose MIME type (declared
/// or extension-derived) is in the known table
pub fn registration(probe: MetadataProbe) -> crate::registry::Registration {
    use crate::registry::Registration;
    use crate::source::{mime_is_known, CanPlay};

    Registration {
        kind: BackendKind::Native,
        can_play_type: Arc::new(|mime| {
            if mime_is_known(mime) {
                CanPlay::Probably
            } else {
                CanPlay::Empty
            }
        }),
        can_play_source: Arc::new(|source| {
            if mime_of(source).is_some() {
                CanPlay::Probably
            } else {
                CanPlay::Empty
            }
        }),
        claims_existing: Arc::new(|_| false),
        construct: Arc::new(move |_, _| Ok(Box::new(NativeBackend::new(Arc::clone(&probe))))),
    }
}
