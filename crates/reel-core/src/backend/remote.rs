//! Remote embedded-player bridge
//!
//! Backend for players living in a remote iframe and driven over
//! cross-document messaging. The remote API exposes only a small
//! enumerated callback set (ready / error / state-changed /
//! quality-changed) and none of the native waiting/progress/seeking
//! signals, so the bridge synthesizes them:
//!
//! - buffered amount is polled and diffed into `progress` events
//! - seeks are inferred from polled position deltas: a jump larger than
//!   the configured threshold cannot be natural advancement (isolated in
//!   [`SeekDetector`] so synthetic sequences can pin the heuristic)
//! - the duration is unreliable right after load (the remote reports 0
//!   until its own metadata arrives) and is force-refreshed once with a
//!   play+immediate-pause, then polled with a short backoff
//! - volume/mute changes are confirmed by watching the remote getters
//!   until they reflect the commanded value, then folded into one
//!   `volumechange`

use crate::adapter::BridgeLink;
use crate::backend::{
    BackendCommand, BackendKind, Container, ExistingPlayer, MediaBackend, PlaybackSnapshot,
};
use crate::error::{MediaError, MediaErrorCode, Result};
use crate::events::MediaEventKind;
use crate::scheduler::TimerId;
use crate::source::{CanPlay, Source};
use crate::state::{EndedDisposition, NetworkState, ReadyState};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Coarse playback states reported by the remote player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemotePlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

/// The remote player's entire notification surface
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Ready,
    StateChange(RemotePlayerState),
    Error(u32),
    PlaybackQualityChange,
}

/// Handler invoked by the remote player's messaging layer
pub type RemoteEventHandler = Box<dyn FnMut(RemoteEvent) + Send>;

/// Boundary trait for a remote embedded player
///
/// Event delivery must be asynchronous: implementations never invoke the
/// handler from inside a command call.
pub trait RemotePlayer: Send {
    fn set_event_handler(&mut self, handler: RemoteEventHandler);
    fn clear_event_handler(&mut self);

    /// Cue the medium with the given provider id
    fn load(&mut self, media_id: &str);

    fn play(&mut self);
    fn pause(&mut self);

    /// Stop and unload; faults are reported, never thrown further
    fn stop(&mut self) -> std::result::Result<(), String>;

    fn seek_to(&mut self, time: f64);

    fn position(&self) -> f64;

    /// Reported duration; zero until the remote metadata has loaded
    fn duration(&self) -> f64;

    /// Fraction of the medium buffered, in `[0, 1]`
    fn loaded_fraction(&self) -> f64;

    fn set_volume(&mut self, volume: f64);
    fn volume(&self) -> f64;

    fn mute(&mut self);
    fn unmute(&mut self);
    fn is_muted(&self) -> bool;

    fn playback_quality(&self) -> String;
    fn set_playback_quality(&mut self, quality: &str);
    fn available_quality_levels(&self) -> Vec<String>;

    /// Release the player; faults are reported, never thrown further
    fn destroy(&mut self) -> std::result::Result<(), String>;
}

/// Shared handle to a remote player instance
pub type SharedRemotePlayer = Arc<Mutex<Box<dyn RemotePlayer>>>;

/// Constructor for fresh remote players bound to a container
pub type RemotePlayerFactory =
    Arc<dyn Fn(&Container) -> Result<SharedRemotePlayer> + Send + Sync>;

// =============================================================================
// Seek heuristic
// =============================================================================

/// Position-delta seek detector
///
/// Genuine seeks and natural advancement are indistinguishable in the
/// remote API, so a polled position that moved further than the jump
/// threshold within one tick is treated as a seek.
#[derive(Debug)]
pub struct SeekDetector {
    jump_threshold: f64,
    last: Option<f64>,
}

impl SeekDetector {
    pub fn new(jump_threshold: f64) -> Self {
        Self {
            jump_threshold,
            last: None,
        }
    }

    /// Feed one position sample; true when the delta reads as a seek
    pub fn observe(&mut self, position: f64) -> bool {
        let jumped = self
            .last
            .map(|last| (position - last).abs() > self.jump_threshold)
            .unwrap_or(false);
        self.last = Some(position);
        jumped
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

// =============================================================================
// Source recognition
// =============================================================================

/// Mime type reserved for forcing the remote backend
pub const REMOTE_MIME: &str = "video/x-remote";

const WATCH_HOSTS: &[&str] = &["www.youtube.com", "youtube.com", "m.youtube.com"];
const SHORT_HOSTS: &[&str] = &["youtu.be"];

/// Extract the provider media id from a watch/embed/short URL
pub fn extract_media_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    if WATCH_HOSTS.contains(&host) {
        if url.path() == "/watch" {
            if let Some((_, id)) = url.query_pairs().find(|(k, _)| k == "v") {
                return Some(id.into_owned());
            }
        }
        if let Some(id) = url.path().strip_prefix("/embed/") {
            if !id.is_empty() {
                return Some(id.trim_end_matches('/').to_string());
            }
        }
        return None;
    }
    if SHORT_HOSTS.contains(&host) {
        let id = url.path().trim_start_matches('/');
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    None
}

fn remote_can_play_source(source: &Source) -> CanPlay {
    if source.mime_type.as_deref() == Some(REMOTE_MIME) {
        return CanPlay::Probably;
    }
    if extract_media_id(&source.url).is_some() {
        CanPlay::Probably
    } else {
        CanPlay::Empty
    }
}

/// Fixed numeric-code table from the remote API into the media error model
fn map_remote_error(code: u32) -> MediaError {
    match code {
        2 => MediaError::new("Invalid media parameter", MediaErrorCode::Aborted),
        5 => MediaError::new(
            "The requested content cannot be played by the embedded player",
            MediaErrorCode::Decode,
        ),
        100 => MediaError::new("Media not found", MediaErrorCode::Network),
        101 | 150 => MediaError::new("Media not embeddable", MediaErrorCode::SrcNotSupported),
        _ => MediaError::new("Unknown remote player error", MediaErrorCode::Unknown),
    }
}

// =============================================================================
// Bridge
// =============================================================================

struct RemoteShared {
    ready: bool,
    last_state: Option<RemotePlayerState>,
    seek_target: Option<f64>,
    detector: SeekDetector,
    last_fraction: f64,
    forced_metadata: bool,
    position_timer: Option<TimerId>,
    timeupdate_timer: Option<TimerId>,
    buffered_timer: Option<TimerId>,
    watch_timer: Option<TimerId>,
    /// Volume/mute snapshot taken when a change was commanded; cleared once
    /// the remote reflects a different value
    volume_watch: Option<(f64, bool)>,
}

impl RemoteShared {
    fn new(jump_threshold: f64) -> Self {
        Self {
            ready: false,
            last_state: None,
            seek_target: None,
            detector: SeekDetector::new(jump_threshold),
            last_fraction: 0.0,
            forced_metadata: false,
            position_timer: None,
            timeupdate_timer: None,
            buffered_timer: None,
            watch_timer: None,
            volume_watch: None,
        }
    }

    fn take_timers(&mut self) -> Vec<TimerId> {
        [
            self.position_timer.take(),
            self.timeupdate_timer.take(),
            self.buffered_timer.take(),
            self.watch_timer.take(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Bridge over a [`RemotePlayer`]
pub struct RemoteBackend {
    player: SharedRemotePlayer,
    adopted: bool,
    link: Option<BridgeLink>,
    shared: Arc<Mutex<RemoteShared>>,
}

struct Ctx {
    player: SharedRemotePlayer,
    shared: Arc<Mutex<RemoteShared>>,
    link: BridgeLink,
}

impl Clone for Ctx {
    fn clone(&self) -> Self {
        Self {
            player: Arc::clone(&self.player),
            shared: Arc::clone(&self.shared),
            link: self.link.clone(),
        }
    }
}

/// Poll for a usable duration, forcing metadata once via play+pause
fn refresh_duration(ctx: &Ctx) {
    if !ctx.link.is_current() {
        return;
    }
    if !ctx.shared.lock().ready {
        return;
    }
    let duration = ctx.player.lock().duration();
    if duration > 0.0 {
        let mut autoplay = false;
        ctx.link.update(|state, out| {
            state.resolve_duration(duration, out);
            autoplay = state.autoplay && state.paused;
        });
        start_buffered_monitor(ctx);
        if autoplay {
            ctx.link.command_backend(BackendCommand::Play);
        }
        return;
    }

    // The remote reports 0 until its own metadata loads, which normally
    // happens only once playback starts. Nudge it once, then keep polling.
    {
        let mut shared = ctx.shared.lock();
        if !shared.forced_metadata {
            shared.forced_metadata = true;
            let mut player = ctx.player.lock();
            player.play();
            player.pause();
        }
    }
    let retry = ctx.clone();
    ctx.link.scheduler().after(
        ctx.link.config().duration_retry,
        Box::new(move || refresh_duration(&retry)),
    );
}

fn start_position_monitor(ctx: &Ctx) {
    let mut shared = ctx.shared.lock();
    if shared.position_timer.is_some() {
        return;
    }
    let tick = ctx.clone();
    let tolerance = ctx.link.config().seek_settle_tolerance;
    shared.position_timer = Some(ctx.link.scheduler().every(
        ctx.link.config().position_poll,
        Box::new(move || {
            if !tick.link.is_current() {
                return;
            }
            let position = tick.player.lock().position();
            let (user_seek, settled) = {
                let mut shared = tick.shared.lock();
                let seeking = tick.link.read(|s| s.seeking).unwrap_or(false);
                let jumped = shared.detector.observe(position);
                let user_seek = jumped && !seeking && shared.seek_target.is_none();
                let settled = match shared.seek_target {
                    Some(target) if (position - target).abs() < tolerance => {
                        shared.seek_target = None;
                        true
                    }
                    _ => false,
                };
                (user_seek, settled)
            };
            if user_seek {
                // A jump the adapter did not command: the viewer seeked
                // through the remote player's own controls.
                tick.link.update(|state, out| {
                    state.begin_seek(out);
                    state.current_time = position;
                    state.complete_seek(out);
                });
            } else if settled {
                tick.link.update(|state, out| {
                    state.current_time = position;
                    state.complete_seek(out);
                    state.set_ready_state(ReadyState::HaveFutureData, out);
                    state.set_ready_state(ReadyState::HaveEnoughData, out);
                });
            } else {
                tick.link.update(|state, _| {
                    state.current_time = position;
                });
            }
        }),
    ));
}

fn start_timeupdate(ctx: &Ctx) {
    let mut shared = ctx.shared.lock();
    if shared.timeupdate_timer.is_some() {
        return;
    }
    let tick_link = ctx.link.clone();
    shared.timeupdate_timer = Some(ctx.link.scheduler().every(
        ctx.link.config().timeupdate_interval,
        Box::new(move || {
            tick_link.dispatch(MediaEventKind::TimeUpdate);
        }),
    ));
}

fn stop_timeupdate(ctx: &Ctx) {
    let mut shared = ctx.shared.lock();
    if let Some(timer) = shared.timeupdate_timer.take() {
        ctx.link.scheduler().cancel(timer);
    }
}

fn start_buffered_monitor(ctx: &Ctx) {
    let mut shared = ctx.shared.lock();
    if shared.buffered_timer.is_some() {
        return;
    }
    let tick = ctx.clone();
    shared.buffered_timer = Some(ctx.link.scheduler().every(
        ctx.link.config().buffered_poll,
        Box::new(move || {
            if !tick.link.is_current() {
                return;
            }
            let fraction = tick.player.lock().loaded_fraction();
            let changed = {
                let mut shared = tick.shared.lock();
                if (fraction - shared.last_fraction).abs() > f64::EPSILON {
                    shared.last_fraction = fraction;
                    true
                } else {
                    false
                }
            };
            if changed {
                tick.link.update(|state, out| {
                    if state.has_duration() {
                        state.note_progress(fraction * state.duration, out);
                    }
                    out.push(MediaEventKind::Progress);
                });
                if fraction >= 1.0 {
                    let mut shared = tick.shared.lock();
                    if let Some(timer) = shared.buffered_timer.take() {
                        tick.link.scheduler().cancel(timer);
                    }
                }
            }
        }),
    ));
}

/// Watch the remote volume getters until they move off the snapshot taken
/// when the change was commanded, then fold into one `volumechange`
fn watch_volume(ctx: &Ctx) {
    let mut shared = ctx.shared.lock();
    if shared.volume_watch.is_none() {
        let player = ctx.player.lock();
        shared.volume_watch = Some((player.volume(), player.is_muted()));
    }
    if shared.watch_timer.is_some() {
        return;
    }
    let tick = ctx.clone();
    shared.watch_timer = Some(ctx.link.scheduler().every(
        ctx.link.config().position_poll,
        Box::new(move || {
            let (volume, muted) = {
                let player = tick.player.lock();
                (player.volume(), player.is_muted())
            };
            let fired = {
                let mut shared = tick.shared.lock();
                match shared.volume_watch {
                    Some((v, m)) if (volume - v).abs() > f64::EPSILON || muted != m => {
                        shared.volume_watch = None;
                        if let Some(timer) = shared.watch_timer.take() {
                            tick.link.scheduler().cancel(timer);
                        }
                        true
                    }
                    None => {
                        if let Some(timer) = shared.watch_timer.take() {
                            tick.link.scheduler().cancel(timer);
                        }
                        false
                    }
                    _ => false,
                }
            };
            if fired {
                tick.link
                    .update(|state, out| state.sync_volume_from_backend(volume, muted, out));
            }
        }),
    ));
}

fn handle_state_change(ctx: &Ctx, new_state: RemotePlayerState) {
    // Duration may have become real at any state edge.
    refresh_duration(ctx);

    let previous = {
        let mut shared = ctx.shared.lock();
        shared.last_state.replace(new_state)
    };

    match new_state {
        RemotePlayerState::Playing => {
            let abort_for_seek = ctx
                .link
                .read(|s| s.seeking && s.paused)
                .unwrap_or(false);
            if abort_for_seek {
                // A paused seek made the remote start playing on its own;
                // push it straight back.
                ctx.player.lock().pause();
                return;
            }
            ctx.shared.lock().forced_metadata = true;
            start_position_monitor(ctx);
            start_timeupdate(ctx);
            ctx.link.update(|state, out| {
                state.note_play(out);
                state.note_playing(out);
            });
        }
        RemotePlayerState::Paused => {
            stop_timeupdate(ctx);
            ctx.link.update(|state, out| state.note_pause(out));
        }
        RemotePlayerState::Ended => {
            let mut restart = false;
            ctx.link.update(|state, out| {
                if state.loop_ {
                    restart = state.note_ended(out) == EndedDisposition::Restart;
                } else {
                    state.note_pause(out);
                    state.note_ended(out);
                }
            });
            if restart {
                ctx.link.command_backend(BackendCommand::Seek(0.0));
                ctx.link.command_backend(BackendCommand::Play);
            } else {
                stop_timeupdate(ctx);
            }
        }
        RemotePlayerState::Buffering => {
            ctx.link.update(|state, out| {
                state.network_state = NetworkState::Loading;
                out.push(MediaEventKind::Waiting);
            });
        }
        RemotePlayerState::Unstarted | RemotePlayerState::Cued => {}
    }

    if previous == Some(RemotePlayerState::Buffering) && new_state != RemotePlayerState::Buffering {
        ctx.link.dispatch(MediaEventKind::Progress);
    }
}

fn handle_remote_event(ctx: &Ctx, event: RemoteEvent) {
    if !ctx.link.is_current() {
        return;
    }
    match event {
        RemoteEvent::Ready => {
            debug!("remote player ready");
            ctx.shared.lock().ready = true;
            ctx.link.mark_ready();
            refresh_duration(ctx);
        }
        RemoteEvent::StateChange(state) => handle_state_change(ctx, state),
        RemoteEvent::Error(code) => {
            ctx.link
                .update(|state, out| state.fail(map_remote_error(code), out));
        }
        RemoteEvent::PlaybackQualityChange => {
            ctx.link.dispatch(MediaEventKind::PlaybackQualityChange);
        }
    }
}

impl RemoteBackend {
    pub fn new(player: SharedRemotePlayer) -> Self {
        Self::build(player, false)
    }

    /// Wrap a player that already existed in the host; teardown detaches
    /// but never destroys it
    pub fn adopt(player: SharedRemotePlayer) -> Self {
        Self::build(player, true)
    }

    fn build(player: SharedRemotePlayer, adopted: bool) -> Self {
        Self {
            player,
            adopted,
            link: None,
            shared: Arc::new(Mutex::new(RemoteShared::new(1.0))),
        }
    }

    fn ctx(&self) -> Option<Ctx> {
        let link = self.link.clone()?;
        Some(Ctx {
            player: Arc::clone(&self.player),
            shared: Arc::clone(&self.shared),
            link,
        })
    }

    fn cancel_timers(&self) {
        let Some(link) = &self.link else { return };
        for timer in self.shared.lock().take_timers() {
            link.scheduler().cancel(timer);
        }
    }
}

impl MediaBackend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn attach(&mut self, link: BridgeLink) {
        *self.shared.lock() = RemoteShared::new(link.config().seek_jump_threshold);
        self.link = Some(link);
        let ctx = self.ctx().expect("link just attached");
        self.player.lock().set_event_handler(Box::new(move |event| {
            handle_remote_event(&ctx, event);
        }));
    }

    fn detach(&mut self) {
        self.cancel_timers();
        self.player.lock().clear_event_handler();
        self.link = None;
    }

    fn is_ready(&self) -> bool {
        self.shared.lock().ready
    }

    fn load(&mut self, sources: &[Source]) {
        let Some(ctx) = self.ctx() else { return };
        let chosen = sources
            .iter()
            .find(|s| remote_can_play_source(s).is_positive())
            .or_else(|| sources.first());
        let Some(source) = chosen else { return };

        // Absorb transport flags carried on the watch URL; they configure
        // the adapter rather than pass through to the remote.
        if let Ok(url) = Url::parse(&source.url) {
            let autoplay = url.query_pairs().any(|(k, v)| k == "autoplay" && v == "1");
            let loop_ = url.query_pairs().any(|(k, v)| k == "loop" && v == "1");
            let controls = url.query_pairs().any(|(k, v)| k == "controls" && v != "0");
            ctx.link.update(|state, _| {
                state.autoplay = state.autoplay || autoplay;
                state.loop_ = state.loop_ || loop_;
                state.controls = state.controls || controls;
            });
        }

        let media_id = extract_media_id(&source.url);
        debug!(url = %source.url, media_id = ?media_id, "remote player loading");
        match media_id {
            Some(id) => {
                ctx.link.dispatch(MediaEventKind::Progress);
                self.player.lock().load(&id);
                refresh_duration(&ctx);
            }
            None => {
                ctx.link
                    .update(|state, out| state.fail(MediaError::src_not_supported(), out));
            }
        }
    }

    fn command(&mut self, command: BackendCommand) {
        let Some(ctx) = self.ctx() else { return };
        match command {
            BackendCommand::Play => self.player.lock().play(),
            BackendCommand::Pause => self.player.lock().pause(),
            BackendCommand::Seek(time) => {
                {
                    let mut shared = self.shared.lock();
                    shared.seek_target = Some(time);
                    shared.detector.reset();
                }
                ctx.link.update(|state, out| state.begin_seek(out));
                self.player.lock().seek_to(time);
                start_position_monitor(&ctx);
            }
            BackendCommand::SetVolume(volume) => {
                watch_volume(&ctx);
                self.player.lock().set_volume(volume);
            }
            BackendCommand::SetMuted(muted) => {
                watch_volume(&ctx);
                let mut player = self.player.lock();
                if muted {
                    player.mute();
                } else {
                    player.unmute();
                }
            }
            BackendCommand::SetQuality(quality) => {
                self.player.lock().set_playback_quality(&quality);
            }
        }
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        let player = self.player.lock();
        let duration = player.duration();
        PlaybackSnapshot {
            position: player.position(),
            duration,
            buffered_end: player.loaded_fraction() * duration.max(0.0),
            volume: player.volume(),
            muted: player.is_muted(),
        }
    }

    fn destroy(&mut self) {
        self.cancel_timers();
        self.player.lock().clear_event_handler();
        self.link = None;
        self.shared.lock().ready = false;
        if self.adopted {
            return;
        }
        let mut player = self.player.lock();
        if let Err(fault) = player.stop() {
            debug!(fault = %fault, "remote player stop fault swallowed");
        }
        if let Err(fault) = player.destroy() {
            debug!(fault = %fault, "remote player destroy fault swallowed");
        }
    }

    fn playback_quality(&self) -> Option<String> {
        Some(self.player.lock().playback_quality())
    }

    fn available_quality_levels(&self) -> Vec<String> {
        self.player.lock().available_quality_levels()
    }
}

/// Register the remote embedded-player kind
pub fn registration(factory: RemotePlayerFactory) -> crate::registry::Registration {
    use crate::registry::Registration;

    Registration {
        kind: BackendKind::Remote,
        can_play_type: Arc::new(|mime| {
            if mime == REMOTE_MIME {
                CanPlay::Probably
            } else {
                CanPlay::Empty
            }
        }),
        can_play_source: Arc::new(remote_can_play_source),
        claims_existing: Arc::new(|container| {
            matches!(container.existing(), Some(ExistingPlayer::Remote(_)))
        }),
        construct: Arc::new(move |container, _config| {
            if let Some(ExistingPlayer::Remote(player)) = container.existing() {
                return Ok(Box::new(RemoteBackend::adopt(player)));
            }
            let player = factory(container)?;
            Ok(Box::new(RemoteBackend::new(player)))
        }),
    }
}
