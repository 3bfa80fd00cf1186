//! Nested playback session
//!
//! Owns one nested [`MediaAdapter`] and keeps its clock phase-locked to a
//! parent adapter while the host's visible window is open. The nested
//! backend is re-resolved on every source change: a different backend
//! kind tears the old stack down completely, the same kind swaps the
//! source in place, and a source that normalizes to the current one is
//! left untouched.
//!
//! Offset formula throughout: nested time = parent time - window start +
//! trim-in, clamped into the nested medium.

use crate::behavior::NestedBehavior;
use crate::options::{NestedEventDescriptor, NestedOptions, NestedUpdate, VolumePolicy};
use crate::plugin::{TimelineEvent, TimelinePlugin};
use crate::SessionContext;
use parking_lot::Mutex;
use reel_core::source::{normalized_equal, with_trim_fragment};
use reel_core::{BackendKind, Container, ListenerId, MediaAdapter, MediaEventKind, Source, TrimFragment};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

struct SessionInner {
    ctx: SessionContext,
    parent: MediaAdapter,
    nested: Option<MediaAdapter>,
    options: NestedOptions,
    /// Effective trim-in (seconds into the nested medium)
    from: f64,
    /// Effective trim-out; infinite when unbounded
    to: f64,
    active: bool,
    duration_clamped: bool,
    /// Seek requested before the nested duration was known; latest wins
    pending_seek: Option<f64>,
    last_parent_time: f64,
    parent_listeners: Vec<ListenerId>,
    volume_listener: Option<ListenerId>,
    nested_listeners: Vec<ListenerId>,
    behaviors: Vec<(String, Box<dyn NestedBehavior>)>,
}

/// A parent-synchronized secondary adapter, driven by the host's four
/// plugin lifecycle hooks
pub struct NestedSession {
    inner: Arc<Mutex<SessionInner>>,
}

fn effective_trim(options: &NestedOptions) -> (f64, f64) {
    let from = options.from.unwrap_or(0.0).max(0.0);
    let mut to = options.to.unwrap_or(f64::INFINITY);
    if to < from {
        to = f64::INFINITY;
    }
    (from, to)
}

fn force_mime(kind: BackendKind) -> Option<&'static str> {
    match kind {
        BackendKind::Library => Some("video/x-library"),
        BackendKind::Remote => Some("video/x-remote"),
        BackendKind::Native => None,
    }
}

fn desired_kind(inner: &SessionInner, sources: &[Source]) -> Option<BackendKind> {
    if let Some(kind) = inner.options.media_type {
        return Some(kind);
    }
    inner
        .ctx
        .registry
        .resolve(&inner.ctx.container, sources)
        .map(|registration| registration.kind)
}

/// Sources as handed to the nested adapter: forced-kind MIME tags, plus a
/// `#t=from,to` trim descriptor for native playback
fn decorated_sources(inner: &SessionInner) -> Vec<Source> {
    let mut sources = inner.options.source.clone();
    if let Some(kind) = inner.options.media_type {
        if let Some(mime) = force_mime(kind) {
            for source in &mut sources {
                source.mime_type = Some(mime.to_string());
            }
        }
    }
    if desired_kind(inner, &sources) == Some(BackendKind::Native)
        && (inner.from > 0.0 || inner.to.is_finite())
    {
        let trim = TrimFragment {
            from: inner.from,
            to: inner.to.is_finite().then_some(inner.to),
        };
        for source in &mut sources {
            source.url = with_trim_fragment(&source.url, trim);
        }
    }
    sources
}

fn seek_nested(inner: &mut SessionInner, nested: &MediaAdapter, time: f64) {
    if nested.duration().is_nan() {
        // Remember only the most recent target; applied on metadata.
        inner.pending_seek = Some(time);
    } else {
        let _ = nested.set_current_time(time);
    }
}

/// Compute and apply the play-on-start procedure
fn play_on_start(inner: &mut SessionInner) {
    if !inner.active {
        return;
    }
    let Some(nested) = inner.nested.clone() else {
        return;
    };
    let mut time = 0.0;
    if inner.options.sync {
        let parent_time = inner.parent.current_time();
        inner.last_parent_time = parent_time;
        time = parent_time - inner.options.start + inner.from;
    }
    let time = time.max(0.0);
    if time < inner.to {
        seek_nested(inner, &nested, time);
        nested.play();
    } else {
        let duration = nested.duration();
        let limit = if duration.is_nan() {
            inner.to
        } else {
            inner.to.min(duration)
        };
        if limit.is_finite() {
            seek_nested(inner, &nested, limit);
        }
    }
}

fn handle_parent_play(session: &Arc<Mutex<SessionInner>>) {
    play_on_start(&mut session.lock());
}

fn handle_parent_pause(session: &Arc<Mutex<SessionInner>>) {
    let nested = session.lock().nested.clone();
    if let Some(nested) = nested {
        nested.pause();
    }
}

fn handle_parent_seeking(session: &Arc<Mutex<SessionInner>>) {
    let mut inner = session.lock();
    if !inner.active {
        return;
    }
    let Some(nested) = inner.nested.clone() else {
        return;
    };
    // Never race a seek against running playback.
    nested.pause();
    let mut time = 0.0;
    if inner.options.sync {
        let parent_time = inner.parent.current_time();
        inner.last_parent_time = parent_time;
        time = parent_time - inner.options.start + inner.from;
    }
    let mut time = time.max(0.0);
    if time >= inner.to {
        let duration = nested.duration();
        time = if duration.is_nan() {
            inner.to
        } else {
            inner.to.min(duration)
        };
    }
    if time.is_finite() {
        seek_nested(&mut inner, &nested, time);
    }
}

fn handle_parent_seeked(session: &Arc<Mutex<SessionInner>>) {
    let mut inner = session.lock();
    if !inner.parent.paused() {
        play_on_start(&mut inner);
    }
}

fn handle_parent_volume(session: &Arc<Mutex<SessionInner>>) {
    let inner = session.lock();
    if inner.options.volume != Some(VolumePolicy::FollowParent) {
        return;
    }
    let Some(nested) = inner.nested.clone() else {
        return;
    };
    let volume = inner.parent.volume();
    let muted = inner.parent.muted();
    drop(inner);
    let _ = nested.set_volume(volume);
    nested.set_muted(muted);
}

/// First real nested duration: clamp the trim-out bound and flush any
/// seek that was waiting on metadata
fn handle_nested_metadata(session: &Arc<Mutex<SessionInner>>) {
    let mut inner = session.lock();
    clamp_trim_to_duration(&mut inner);
    if let Some(time) = inner.pending_seek.take() {
        if inner.active {
            if let Some(nested) = inner.nested.clone() {
                let _ = nested.set_current_time(time);
            }
        }
    }
}

/// Trim-end guard plus drift correction against the parent clock
fn handle_nested_timeupdate(session: &Arc<Mutex<SessionInner>>) {
    let mut inner = session.lock();
    let Some(nested) = inner.nested.clone() else {
        return;
    };
    let position = nested.current_time();
    if inner.to.is_finite() && position >= inner.to && !nested.paused() {
        nested.pause();
        return;
    }
    if inner.active && inner.options.sync && !inner.parent.paused() {
        let parent_time = inner.parent.current_time();
        inner.last_parent_time = parent_time;
        let expected = (parent_time - inner.options.start + inner.from).max(0.0);
        let drift = (position - expected).abs();
        if drift > inner.ctx.config.seek_jump_threshold && expected < inner.to {
            debug!(drift, expected, position, "correcting nested drift");
            let _ = nested.set_current_time(expected);
        }
    }
}

fn clamp_trim_to_duration(inner: &mut SessionInner) {
    if inner.duration_clamped {
        return;
    }
    let Some(nested) = &inner.nested else { return };
    let duration = nested.duration();
    if duration.is_nan() {
        return;
    }
    inner.to = inner.to.min(duration);
    let window = inner.options.end - inner.options.start;
    if window.is_finite() {
        inner.to = inner.to.min(inner.from + window);
    }
    inner.duration_clamped = true;
    debug!(from = inner.from, to = inner.to, "trim bounds clamped");
}

fn attach_volume_listener(session: &Arc<Mutex<SessionInner>>, inner: &mut SessionInner) {
    if inner.volume_listener.is_some() {
        return;
    }
    let weak = Arc::downgrade(session);
    inner.volume_listener = Some(inner.parent.on(MediaEventKind::VolumeChange, move |_| {
        if let Some(session) = weak.upgrade() {
            handle_parent_volume(&session);
        }
    }));
}

fn detach_volume_listener(inner: &mut SessionInner) {
    if let Some(id) = inner.volume_listener.take() {
        inner.parent.off(id);
    }
}

fn apply_volume_policy(
    session: &Arc<Mutex<SessionInner>>,
    inner: &mut SessionInner,
    policy: Option<VolumePolicy>,
) {
    inner.options.volume = policy;
    let nested = inner.nested.clone();
    match policy {
        Some(VolumePolicy::Fixed(level)) => {
            detach_volume_listener(inner);
            if let Some(nested) = nested {
                let _ = nested.set_volume(level);
            }
        }
        Some(VolumePolicy::FollowParent) => {
            if let Some(nested) = nested {
                let _ = nested.set_volume(inner.parent.volume());
                nested.set_muted(inner.parent.muted());
            }
            attach_volume_listener(session, inner);
        }
        None => detach_volume_listener(inner),
    }
}

/// Build a fresh nested adapter over the session container and load the
/// decorated sources into it
fn setup_nested(session: &Arc<Mutex<SessionInner>>, inner: &mut SessionInner) {
    if inner.options.source.is_empty() {
        return;
    }
    let adapter = MediaAdapter::with_config(
        inner.ctx.container.clone(),
        Arc::clone(&inner.ctx.registry),
        Arc::clone(&inner.ctx.scheduler),
        inner.ctx.config.clone(),
    );
    adapter.set_controls(inner.options.controls);
    adapter.set_poster(inner.options.poster.clone());

    let weak: Weak<Mutex<SessionInner>> = Arc::downgrade(session);
    let metadata_weak = weak.clone();
    inner.nested_listeners.push(adapter.on(
        MediaEventKind::LoadedMetadata,
        move |_| {
            if let Some(session) = metadata_weak.upgrade() {
                handle_nested_metadata(&session);
            }
        },
    ));
    let timeupdate_weak = weak;
    inner.nested_listeners.push(adapter.on(
        MediaEventKind::TimeUpdate,
        move |_| {
            if let Some(session) = timeupdate_weak.upgrade() {
                handle_nested_timeupdate(&session);
            }
        },
    ));

    inner.nested = Some(adapter.clone());
    inner.duration_clamped = false;
    inner.pending_seek = None;

    let sources = decorated_sources(inner);
    info!(count = sources.len(), "nested adapter loading sources");
    adapter.set_src(sources);

    let policy = inner.options.volume;
    apply_volume_policy(session, inner, policy);

    if inner.from > 0.0 {
        let from = inner.from;
        seek_nested(inner, &adapter, from);
    }
}

fn teardown_nested(inner: &mut SessionInner) {
    if let Some(nested) = inner.nested.take() {
        for id in inner.nested_listeners.drain(..) {
            nested.off(id);
        }
        nested.destroy();
    }
    inner.nested_listeners.clear();
    inner.pending_seek = None;
    inner.duration_clamped = false;
}

fn attach_parent_listeners(session: &Arc<Mutex<SessionInner>>, inner: &mut SessionInner) {
    type Handler = fn(&Arc<Mutex<SessionInner>>);
    let mut hooks: Vec<(MediaEventKind, Handler)> =
        vec![(MediaEventKind::Play, handle_parent_play)];
    if inner.options.sync {
        hooks.push((MediaEventKind::Pause, handle_parent_pause));
        hooks.push((MediaEventKind::Seeking, handle_parent_seeking));
        hooks.push((MediaEventKind::Seeked, handle_parent_seeked));
    }
    for (kind, handler) in hooks {
        let weak = Arc::downgrade(session);
        inner.parent_listeners.push(inner.parent.on(kind, move |_| {
            if let Some(session) = weak.upgrade() {
                handler(&session);
            }
        }));
    }
}

fn detach_parent_listeners(inner: &mut SessionInner) {
    for id in inner.parent_listeners.drain(..) {
        inner.parent.off(id);
    }
}

fn apply_event_changes(inner: &mut SessionInner, descriptors: Vec<NestedEventDescriptor>) {
    let nested = inner.nested.clone();
    let new_ids: HashSet<&str> = descriptors.iter().map(|d| d.id.as_str()).collect();

    let mut kept: Vec<(String, Box<dyn NestedBehavior>)> = Vec::new();
    for (id, mut behavior) in inner.behaviors.drain(..) {
        if new_ids.contains(id.as_str()) {
            kept.push((id, behavior));
        } else {
            behavior.teardown();
        }
    }

    for descriptor in &descriptors {
        if let Some((_, behavior)) = kept.iter_mut().find(|(id, _)| *id == descriptor.id) {
            behavior.update(descriptor);
        } else if let Some(mut behavior) = inner.ctx.behaviors.create(descriptor) {
            if inner.active {
                if let Some(nested) = &nested {
                    behavior.enable(nested);
                }
            }
            kept.push((descriptor.id.clone(), behavior));
        }
    }

    inner.behaviors = kept;
    inner.options.events = descriptors;
}

fn handle_source_change(
    session: &Arc<Mutex<SessionInner>>,
    inner: &mut SessionInner,
    new_sources: Vec<Source>,
) {
    let desired = desired_kind(inner, &new_sources);
    let current = inner
        .nested
        .as_ref()
        .and_then(|nested| nested.backend_kind());

    let same_kind = inner.nested.is_some() && desired.is_some() && desired == current;
    if same_kind {
        let base = inner.ctx.base_url.clone();
        let current_url = inner.options.source.first().map(|s| s.url.clone());
        let unchanged = current_url
            .map(|current| {
                new_sources
                    .iter()
                    .any(|s| normalized_equal(&s.url, &current, &base))
            })
            .unwrap_or(false);
        inner.options.source = new_sources;
        if unchanged {
            // Same resource in a different spelling: nothing to rebuild.
            debug!("source update resolves to current source, keeping backend");
            return;
        }
        // Same backend kind: replace the source in place, preserving the
        // adapter and its accumulated timing state.
        let sources = decorated_sources(inner);
        if let Some(nested) = inner.nested.clone() {
            inner.duration_clamped = false;
            inner.pending_seek = None;
            nested.set_src(sources);
        }
        return;
    }

    info!(?desired, ?current, "nested backend kind changed, rebuilding");
    teardown_nested(inner);
    inner.options.source = new_sources;
    let (from, to) = effective_trim(&inner.options);
    inner.from = from;
    inner.to = to;
    setup_nested(session, inner);
}

impl NestedSession {
    /// Build a session over `parent`; the nested adapter is created
    /// immediately (when sources are given) so a later `start` is cheap
    pub fn new(parent: MediaAdapter, options: NestedOptions, mut ctx: SessionContext) -> Self {
        if let Some(id) = &options.container {
            ctx.container = Container::new(id.clone());
        }
        let (from, to) = effective_trim(&options);
        let inner = Arc::new(Mutex::new(SessionInner {
            ctx,
            parent,
            nested: None,
            options,
            from,
            to,
            active: false,
            duration_clamped: false,
            pending_seek: None,
            last_parent_time: 0.0,
            parent_listeners: Vec::new(),
            volume_listener: None,
            nested_listeners: Vec::new(),
            behaviors: Vec::new(),
        }));

        {
            let mut guard = inner.lock();
            setup_nested(&inner, &mut guard);
            let descriptors = guard.options.events.clone();
            apply_event_changes(&mut guard, descriptors);
        }

        Self { inner }
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Handle to the current nested adapter, if any
    pub fn nested(&self) -> Option<MediaAdapter> {
        self.inner.lock().nested.clone()
    }

    /// Effective trim bounds after clamping
    pub fn trim(&self) -> (f64, f64) {
        let inner = self.inner.lock();
        (inner.from, inner.to)
    }

    /// Parent time observed at the most recent synchronization point
    pub fn last_parent_time(&self) -> f64 {
        self.inner.lock().last_parent_time
    }

    pub fn behavior_count(&self) -> usize {
        self.inner.lock().behaviors.len()
    }
}

impl TimelinePlugin for NestedSession {
    fn start(&mut self, event: &TimelineEvent) {
        debug!(time = event.time, "nested session start");
        let mut inner = self.inner.lock();
        if inner.active {
            return;
        }
        inner.active = true;
        attach_parent_listeners(&self.inner, &mut inner);

        let nested = inner.nested.clone();
        if let Some(nested) = &nested {
            for (_, behavior) in inner.behaviors.iter_mut() {
                behavior.enable(nested);
            }
        }

        if !inner.parent.paused() {
            play_on_start(&mut inner);
        }
    }

    fn end(&mut self, event: &TimelineEvent) {
        debug!(time = event.time, "nested session end");
        let mut inner = self.inner.lock();
        if !inner.active {
            return;
        }
        inner.active = false;
        let nested = inner.nested.clone();
        if let Some(nested) = &nested {
            nested.pause();
            for (_, behavior) in inner.behaviors.iter_mut() {
                behavior.disable(nested);
            }
        }
        detach_parent_listeners(&mut inner);
        // The nested adapter stays alive so a restart is cheap.
    }

    fn update(&mut self, changes: NestedUpdate) {
        let mut inner = self.inner.lock();

        if let Some(sync) = changes.sync {
            if inner.options.sync != sync {
                inner.options.sync = sync;
                if inner.active {
                    detach_parent_listeners(&mut inner);
                    attach_parent_listeners(&self.inner, &mut inner);
                }
            }
        }

        if changes.from.is_some() || changes.to.is_some() {
            if let Some(from) = changes.from {
                inner.options.from = Some(from);
            }
            if let Some(to) = changes.to {
                inner.options.to = Some(to);
            }
            let (from, to) = effective_trim(&inner.options);
            inner.from = from;
            inner.to = to;
            inner.duration_clamped = false;
            clamp_trim_to_duration(&mut inner);
        }

        if let Some(policy) = changes.volume {
            apply_volume_policy(&self.inner, &mut inner, Some(policy));
        }

        if let Some(descriptors) = changes.events {
            apply_event_changes(&mut inner, descriptors);
        }

        if let Some(kind) = changes.media_type {
            inner.options.media_type = Some(kind);
        }
        if let Some(sources) = changes.source {
            handle_source_change(&self.inner, &mut inner, sources);
        } else if changes.media_type.is_some() {
            // A forced kind on its own may still require a rebuild.
            let sources = inner.options.source.clone();
            if !sources.is_empty() {
                handle_source_change(&self.inner, &mut inner, sources);
            }
        }
    }

    fn teardown(&mut self) {
        debug!("nested session teardown");
        let mut inner = self.inner.lock();
        inner.active = false;
        detach_parent_listeners(&mut inner);
        detach_volume_listener(&mut inner);
        for (_, mut behavior) in inner.behaviors.drain(..) {
            behavior.teardown();
        }
        teardown_nested(&mut inner);
    }
}
