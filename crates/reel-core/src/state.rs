//! Media state machine
//!
//! One [`MediaState`] record per adapter instance, mutated only through the
//! transition methods here. Transitions collect the events they imply into
//! an [`EventBuffer`]; the caller dispatches the buffer through the
//! scheduler afterwards, so the machine itself stays synchronous and
//! directly testable.
//!
//! Ready-state ladder and event bursts:
//!
//! | level            | events fired on entry            |
//! |------------------|----------------------------------|
//! | HAVE_METADATA    | `durationchange`, `loadedmetadata` |
//! | HAVE_CURRENT_DATA| `loadeddata`                     |
//! | HAVE_FUTURE_DATA | `loadeddata`, `canplay`          |
//! | HAVE_ENOUGH_DATA | `canplaythrough`                 |
//!
//! `loadstart` belongs to source assignment, not the ladder.

use crate::error::MediaError;
use crate::events::MediaEventKind;
use crate::source::Source;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ordered events produced by a batch of transitions
pub type EventBuffer = Vec<MediaEventKind>;

/// Media readiness levels, monotonically non-decreasing per source lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    #[default]
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    fn next(self) -> ReadyState {
        match self {
            ReadyState::HaveNothing => ReadyState::HaveMetadata,
            ReadyState::HaveMetadata => ReadyState::HaveCurrentData,
            ReadyState::HaveCurrentData => ReadyState::HaveFutureData,
            ReadyState::HaveFutureData | ReadyState::HaveEnoughData => ReadyState::HaveEnoughData,
        }
    }

    /// Events fired when this level is entered
    fn burst(self) -> &'static [MediaEventKind] {
        match self {
            ReadyState::HaveNothing => &[],
            ReadyState::HaveMetadata => {
                &[MediaEventKind::DurationChange, MediaEventKind::LoadedMetadata]
            }
            ReadyState::HaveCurrentData => &[MediaEventKind::LoadedData],
            ReadyState::HaveFutureData => &[MediaEventKind::LoadedData, MediaEventKind::CanPlay],
            ReadyState::HaveEnoughData => &[MediaEventKind::CanPlayThrough],
        }
    }
}

/// Network activity levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    #[default]
    Empty = 0,
    Idle = 1,
    Loading = 2,
    NoSource = 3,
}

impl NetworkState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Preload hint carried for backends that honor it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    Metadata,
    #[default]
    Auto,
}

/// Buffered extent report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeRanges {
    ranges: Vec<(f64, f64)>,
}

impl TimeRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(start: f64, end: f64) -> Self {
        let mut ranges = Self::default();
        if end > start {
            ranges.add(start, end);
        }
        ranges
    }

    pub fn add(&mut self, start: f64, end: f64) {
        self.ranges.push((start, end));
    }

    pub fn length(&self) -> usize {
        self.ranges.len()
    }

    pub fn start(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).map(|(s, _)| *s)
    }

    pub fn end(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).map(|(_, e)| *e)
    }
}

/// What the caller must do after an `ended` report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndedDisposition {
    /// Loop is set: seek back to zero and resume without an `ended` event
    Restart,
    /// Playback finished
    Finished,
}

/// Whether buffering has caught up with the full resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressDisposition {
    /// Everything buffered; network is idle
    Complete,
    /// Still loading; the stall monitor should be re-armed
    Loading,
}

/// Per-adapter media state record
#[derive(Debug)]
pub struct MediaState {
    pub src: Vec<Source>,
    pub ready_state: ReadyState,
    max_ready_state: ReadyState,
    pub network_state: NetworkState,
    pub paused: bool,
    pub seeking: bool,
    pub ended: bool,
    pub current_time: f64,
    pub duration: f64,
    volume: f64,
    pub muted: bool,
    premute_volume: Option<f64>,
    pub error: Option<MediaError>,
    pub autoplay: bool,
    pub loop_: bool,
    pub controls: bool,
    pub preload: Preload,
    pub poster: Option<String>,
    play_event_pending: bool,
    playing_event_pending: bool,
    pause_event_pending: bool,
    progress_amount: f64,
}

impl MediaState {
    pub fn new() -> Self {
        Self {
            src: Vec::new(),
            ready_state: ReadyState::HaveNothing,
            max_ready_state: ReadyState::HaveNothing,
            network_state: NetworkState::Empty,
            paused: true,
            seeking: false,
            ended: false,
            current_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
            muted: false,
            premute_volume: None,
            error: None,
            autoplay: false,
            loop_: false,
            controls: false,
            preload: Preload::default(),
            poster: None,
            play_event_pending: false,
            playing_event_pending: false,
            pause_event_pending: false,
            progress_amount: 0.0,
        }
    }

    /// True once the backend has reported a usable duration
    pub fn has_duration(&self) -> bool {
        !self.duration.is_nan() && self.duration > 0.0
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// The volume actually pushed to backends
    pub fn effective_volume(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Advance the readiness ladder toward `target`
    ///
    /// Only ever increases, one level at a time; a jump past `current + 1`
    /// is remembered and climbed level by level so every intermediate burst
    /// fires, even when the backend reports "fully loaded" in one shot.
    /// Frozen while an error is set.
    pub fn set_ready_state(&mut self, target: ReadyState, out: &mut EventBuffer) {
        if self.error.is_some() || target <= self.ready_state {
            return;
        }
        if target > self.max_ready_state {
            self.max_ready_state = target;
        }
        while self.ready_state < self.max_ready_state {
            self.ready_state = self.ready_state.next();
            debug!(ready_state = ?self.ready_state, "readyState advanced");
            out.extend_from_slice(self.ready_state.burst());
        }
    }

    /// Reset for a new source assignment
    ///
    /// Fires `abort` when the previous source was still loading or idle,
    /// then `emptied` whenever any previous source had begun at all.
    pub fn begin_source_change(&mut self, out: &mut EventBuffer) {
        if matches!(self.network_state, NetworkState::Loading | NetworkState::Idle) {
            out.push(MediaEventKind::Abort);
        }
        if self.network_state != NetworkState::Empty {
            out.push(MediaEventKind::Emptied);
        }
        self.ready_state = ReadyState::HaveNothing;
        self.max_ready_state = ReadyState::HaveNothing;
        self.network_state = NetworkState::Empty;
        self.play_event_pending = false;
        self.playing_event_pending = false;
        self.pause_event_pending = false;
        self.paused = true;
        self.ended = false;
        self.seeking = false;
        self.duration = f64::NAN;
        self.progress_amount = 0.0;
        if self.current_time != 0.0 {
            self.current_time = 0.0;
            out.push(MediaEventKind::TimeUpdate);
        }
        self.error = None;
    }

    /// Begin fetching the assigned source
    pub fn begin_load(&mut self, out: &mut EventBuffer) {
        self.network_state = NetworkState::Loading;
        out.push(MediaEventKind::LoadStart);
    }

    /// Record a fault; no readyState advancement happens until a new source
    pub fn fail(&mut self, error: MediaError, out: &mut EventBuffer) {
        debug!(code = ?error.code, message = %error.message, "media error");
        self.error = Some(error);
        self.network_state = NetworkState::NoSource;
        out.push(MediaEventKind::Error);
    }

    /// Accept a duration report from the backend
    ///
    /// Zero/unchanged reports are ignored (remote backends report 0 until
    /// their metadata loads). The first real duration enters HAVE_METADATA;
    /// later changes fire a bare `durationchange`. Any play/playing/pause
    /// events held back while the duration was unknown flush here, in that
    /// order.
    pub fn resolve_duration(&mut self, duration: f64, out: &mut EventBuffer) -> bool {
        if !(duration > 0.0) || (self.has_duration() && duration == self.duration) {
            return false;
        }
        self.duration = duration;
        if self.ready_state < ReadyState::HaveMetadata {
            self.set_ready_state(ReadyState::HaveMetadata, out);
        } else {
            out.push(MediaEventKind::DurationChange);
        }
        if self.play_event_pending {
            self.play_event_pending = false;
            out.push(MediaEventKind::Play);
        }
        if self.playing_event_pending {
            self.playing_event_pending = false;
            out.push(MediaEventKind::Playing);
        }
        if self.pause_event_pending {
            self.pause_event_pending = false;
            if self.paused {
                out.push(MediaEventKind::Pause);
            }
        }
        true
    }

    /// Backend reports playback has started
    pub fn note_play(&mut self, out: &mut EventBuffer) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.ended = false;
        if self.has_duration() {
            out.push(MediaEventKind::Play);
        } else {
            self.play_event_pending = true;
        }
    }

    /// Backend reports frames are actually advancing
    pub fn note_playing(&mut self, out: &mut EventBuffer) {
        if !self.has_duration() {
            self.playing_event_pending = true;
            return;
        }
        self.set_ready_state(ReadyState::HaveCurrentData, out);
        self.set_ready_state(ReadyState::HaveFutureData, out);
        if self.seeking {
            self.seeking = false;
            out.push(MediaEventKind::Seeked);
        }
        out.push(MediaEventKind::Playing);
    }

    /// Backend reports playback has paused
    pub fn note_pause(&mut self, out: &mut EventBuffer) {
        if self.paused {
            return;
        }
        self.paused = true;
        if self.has_duration() {
            out.push(MediaEventKind::Pause);
        } else {
            self.pause_event_pending = true;
        }
    }

    /// Backend reports the end of the resource
    pub fn note_ended(&mut self, out: &mut EventBuffer) -> EndedDisposition {
        if self.loop_ {
            return EndedDisposition::Restart;
        }
        self.ended = true;
        out.push(MediaEventKind::Ended);
        EndedDisposition::Finished
    }

    /// A seek has been issued or detected
    pub fn begin_seek(&mut self, out: &mut EventBuffer) {
        self.seeking = true;
        out.push(MediaEventKind::Seeking);
    }

    /// The seek target has been reached
    pub fn complete_seek(&mut self, out: &mut EventBuffer) {
        if !self.seeking {
            return;
        }
        self.seeking = false;
        out.push(MediaEventKind::Seeked);
        out.push(MediaEventKind::TimeUpdate);
    }

    /// Caller-driven volume change (range already validated)
    pub fn change_volume(&mut self, volume: f64, out: &mut EventBuffer) {
        if (volume - self.volume).abs() < f64::EPSILON {
            return;
        }
        self.volume = volume;
        if self.muted {
            self.premute_volume = Some(volume);
        }
        out.push(MediaEventKind::VolumeChange);
    }

    /// Caller-driven mute toggle; un-muting restores the pre-mute volume
    pub fn change_muted(&mut self, muted: bool, out: &mut EventBuffer) {
        if muted == self.muted {
            return;
        }
        self.muted = muted;
        if muted {
            self.premute_volume = Some(self.volume);
        } else if let Some(volume) = self.premute_volume.take() {
            self.volume = volume;
        }
        out.push(MediaEventKind::VolumeChange);
    }

    /// Reconcile a backend-reported volume/mute pair
    ///
    /// While muted the backend holds volume zero, so its volume reports are
    /// ignored to keep the cached pre-mute value intact. Fires at most one
    /// `volumechange` per distinguishable mutation.
    pub fn sync_volume_from_backend(&mut self, volume: f64, muted: bool, out: &mut EventBuffer) {
        let mut changed = false;
        if muted != self.muted {
            self.muted = muted;
            if muted {
                self.premute_volume = Some(self.volume);
            } else if let Some(v) = self.premute_volume.take() {
                self.volume = v;
            }
            changed = true;
        }
        if !self.muted && (volume - self.volume).abs() > 1e-9 {
            self.volume = volume;
            changed = true;
        }
        if changed {
            out.push(MediaEventKind::VolumeChange);
        }
    }

    /// Backend reports buffering progress up to `buffered_end`
    pub fn note_progress(
        &mut self,
        buffered_end: f64,
        out: &mut EventBuffer,
    ) -> ProgressDisposition {
        self.progress_amount = buffered_end.max(self.current_time);
        self.set_ready_state(ReadyState::HaveCurrentData, out);
        if self.has_duration() && self.progress_amount >= self.duration {
            self.network_state = NetworkState::Idle;
            self.set_ready_state(ReadyState::HaveFutureData, out);
            self.set_ready_state(ReadyState::HaveEnoughData, out);
            ProgressDisposition::Complete
        } else {
            self.network_state = NetworkState::Loading;
            ProgressDisposition::Loading
        }
    }

    /// The stall monitor elapsed without progress
    ///
    /// Returns false when the resource is already fully buffered, in which
    /// case the caller should simply re-arm the monitor.
    pub fn note_stalled(&mut self, out: &mut EventBuffer) -> bool {
        if !self.has_duration() || self.progress_amount < self.duration {
            self.network_state = NetworkState::Idle;
            out.push(MediaEventKind::Stalled);
            true
        } else {
            false
        }
    }
}

impl Default for MediaState {
    fn default() -> Self {
        Self::new()
    }
}
