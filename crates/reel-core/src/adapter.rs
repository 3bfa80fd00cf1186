//! Media adapter facade
//!
//! One [`MediaAdapter`] wraps one backend at a time behind the standard
//! synchronous-looking media surface. Callers may issue commands before
//! the backend has initialized; intent is buffered in the readiness queue
//! and replayed, deduplicated, the moment the bridge reports ready.
//!
//! Lock order is `backend` → `binding`/`queue` → `state`; nothing ever
//! calls into a backend while holding the state lock, and all events leave
//! through the scheduler so listeners run lock-free.

use crate::backend::{
    BackendCommand, BackendKind, BindingId, Container, MediaBackend, PlaybackSnapshot,
};
use crate::config::AdapterConfig;
use crate::error::{Error, MediaError, MediaErrorCode, Result};
use crate::events::{EventTarget, ListenerId, MediaEventKind};
use crate::ready_queue::{ReadyQueue, Scheduled};
use crate::registry::Registry;
use crate::scheduler::Scheduler;
use crate::source::Source;
use crate::state::{EventBuffer, MediaState, NetworkState, Preload, ReadyState, TimeRanges};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

pub(crate) struct AdapterCore {
    state: Mutex<MediaState>,
    queue: Mutex<ReadyQueue<BackendCommand>>,
    backend: Mutex<Option<Box<dyn MediaBackend>>>,
    binding: Mutex<BindingId>,
    events: EventTarget,
    scheduler: Arc<dyn Scheduler>,
    registry: Arc<Registry>,
    container: Container,
    config: AdapterConfig,
    destroyed: AtomicBool,
}

impl Drop for AdapterCore {
    fn drop(&mut self) {
        // Breaks the handler cycle through the external player even when
        // the host forgot to call destroy().
        if let Some(mut backend) = self.backend.get_mut().take() {
            backend.detach();
            backend.destroy();
        }
    }
}

/// Bridge-side handle into one adapter binding
///
/// Every callback a backend wires up captures a clone of its link. A link
/// created under a binding that has since been replaced silently no-ops,
/// so callbacks from a torn-down backend can never touch current state.
#[derive(Clone)]
pub struct BridgeLink {
    core: Weak<AdapterCore>,
    binding: BindingId,
    scheduler: Arc<dyn Scheduler>,
    config: AdapterConfig,
}

impl BridgeLink {
    /// True while this link's binding is still the adapter's current one
    pub fn is_current(&self) -> bool {
        match self.core.upgrade() {
            Some(core) => *core.binding.lock() == self.binding,
            None => false,
        }
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Mutate adapter state and dispatch whatever events the transition
    /// produced. No-op for stale bindings.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut MediaState, &mut EventBuffer),
    {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        if *core.binding.lock() != self.binding {
            return;
        }
        let mut out = EventBuffer::new();
        {
            let mut state = core.state.lock();
            f(&mut state, &mut out);
        }
        core.events.dispatch_burst(&*core.scheduler, out);
    }

    /// Dispatch a single event without touching state
    pub fn dispatch(&self, kind: MediaEventKind) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        if *core.binding.lock() != self.binding {
            return;
        }
        core.events.dispatch(&*core.scheduler, kind);
    }

    /// Read a state field without mutating
    pub fn read<T>(&self, f: impl FnOnce(&MediaState) -> T) -> Option<T> {
        let core = self.core.upgrade()?;
        if *core.binding.lock() != self.binding {
            return None;
        }
        let state = core.state.lock();
        Some(f(&state))
    }

    /// The backend signalled readiness: latch the queue and replay buffered
    /// caller intent in FIFO order on the next scheduler turn
    pub fn mark_ready(&self) {
        let link = self.clone();
        self.scheduler.defer(Box::new(move || {
            let Some(core) = link.core.upgrade() else {
                return;
            };
            let mut backend = core.backend.lock();
            if *core.binding.lock() != link.binding {
                return;
            }
            let commands = core.queue.lock().mark_ready();
            debug!(replayed = commands.len(), "backend ready");
            if let Some(backend) = backend.as_mut() {
                for command in commands {
                    backend.command(command);
                }
            }
        }));
    }

    /// Issue a command back into the backend on the next scheduler turn
    ///
    /// Bridges use this when their own event handling must drive the
    /// player (duration force-refresh, loop restart) without re-entering
    /// the player from inside one of its callbacks.
    pub fn command_backend(&self, command: BackendCommand) {
        let link = self.clone();
        self.scheduler.defer(Box::new(move || {
            let Some(core) = link.core.upgrade() else {
                return;
            };
            let mut backend = core.backend.lock();
            if *core.binding.lock() != link.binding {
                return;
            }
            if let Some(backend) = backend.as_mut() {
                backend.command(command);
            }
        }));
    }
}

/// Construct an adapter over a container handle or an element to adopt
pub fn create_adapter(
    target: impl Into<Container>,
    registry: Arc<Registry>,
    scheduler: Arc<dyn Scheduler>,
) -> MediaAdapter {
    MediaAdapter::new(target.into(), registry, scheduler)
}

/// Uniform media-state wrapper around one playback backend
///
/// Cheap to clone; clones share the underlying adapter instance.
#[derive(Clone)]
pub struct MediaAdapter {
    core: Arc<AdapterCore>,
}

impl MediaAdapter {
    pub fn new(container: Container, registry: Arc<Registry>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_config(container, registry, scheduler, AdapterConfig::default())
    }

    pub fn with_config(
        container: Container,
        registry: Arc<Registry>,
        scheduler: Arc<dyn Scheduler>,
        config: AdapterConfig,
    ) -> Self {
        Self {
            core: Arc::new(AdapterCore {
                state: Mutex::new(MediaState::new()),
                queue: Mutex::new(ReadyQueue::new()),
                backend: Mutex::new(None),
                binding: Mutex::new(BindingId::new()),
                events: EventTarget::new(),
                scheduler,
                registry,
                container,
                config,
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    // =========================================================================
    // Source assignment
    // =========================================================================

    pub fn src(&self) -> Vec<Source> {
        self.core.state.lock().src.clone()
    }

    /// Assign a single source URL
    pub fn set_src_url(&self, url: &str) {
        self.set_src(vec![Source::new(url)]);
    }

    /// Assign an ordered candidate source list
    ///
    /// Always re-resolves the backend kind: a previous backend is fully
    /// torn down before the new source begins loading. Passing an empty
    /// list releases the backend without starting a new load.
    pub fn set_src(&self, sources: Vec<Source>) {
        if self.core.destroyed.load(Ordering::SeqCst) {
            return;
        }
        let core = &self.core;

        let mut out = EventBuffer::new();
        {
            let mut state = core.state.lock();
            state.begin_source_change(&mut out);
            state.src = sources.clone();
        }
        core.events.dispatch_burst(&*core.scheduler, out);

        self.teardown_backend();
        core.queue.lock().reset();

        if sources.is_empty() {
            // An empty source is allowed as a way to release the player.
            return;
        }

        let Some(registration) = core.registry.resolve(&core.container, &sources).cloned() else {
            let mut out = EventBuffer::new();
            core.state.lock().fail(MediaError::src_not_supported(), &mut out);
            core.events.dispatch_burst(&*core.scheduler, out);
            return;
        };

        let mut out = EventBuffer::new();
        core.state.lock().begin_load(&mut out);
        core.events.dispatch_burst(&*core.scheduler, out);

        match (registration.construct)(&core.container, &core.config) {
            Ok(mut backend) => {
                let binding = BindingId::new();
                *core.binding.lock() = binding;
                let link = BridgeLink {
                    core: Arc::downgrade(core),
                    binding,
                    scheduler: Arc::clone(&core.scheduler),
                    config: core.config.clone(),
                };
                backend.attach(link);
                let mut guard = core.backend.lock();
                *guard = Some(backend);
                if let Some(backend) = guard.as_mut() {
                    backend.load(&sources);
                }
            }
            Err(err) => {
                warn!(error = %err, "backend construction failed");
                let mut out = EventBuffer::new();
                core.state
                    .lock()
                    .fail(MediaError::new(err.to_string(), MediaErrorCode::Unknown), &mut out);
                core.events.dispatch_burst(&*core.scheduler, out);
            }
        }
    }

    /// Restart the resource selection algorithm for the current source
    pub fn load(&self) {
        let sources = self.src();
        self.set_src(sources);
    }

    // =========================================================================
    // Transport controls
    // =========================================================================

    pub fn play(&self) {
        self.issue(BackendCommand::Play);
    }

    pub fn pause(&self) {
        self.issue(BackendCommand::Pause);
    }

    pub fn current_time(&self) -> f64 {
        {
            let backend = self.core.backend.lock();
            if let Some(backend) = backend.as_ref() {
                if backend.is_ready() {
                    return backend.snapshot().position;
                }
            }
        }
        self.core.state.lock().current_time
    }

    /// Request a seek; buffered until the backend is ready, keeping only
    /// the most recent requested position
    pub fn set_current_time(&self, time: f64) -> Result<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(Error::InvalidTime(time));
        }
        self.issue(BackendCommand::Seek(time));
        Ok(())
    }

    pub fn duration(&self) -> f64 {
        self.core.state.lock().duration
    }

    pub fn buffered(&self) -> TimeRanges {
        let snapshot = self.snapshot();
        TimeRanges::single(0.0, snapshot.buffered_end)
    }

    // =========================================================================
    // Volume
    // =========================================================================

    pub fn volume(&self) -> f64 {
        self.core.state.lock().volume()
    }

    /// Set the volume; values outside `[0, 1]` fail synchronously and
    /// leave the adapter untouched
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        if volume.is_nan() || !(0.0..=1.0).contains(&volume) {
            return Err(Error::InvalidVolume(volume));
        }
        let mut out = EventBuffer::new();
        let effective = {
            let mut state = self.core.state.lock();
            state.change_volume(volume, &mut out);
            state.effective_volume()
        };
        self.core.events.dispatch_burst(&*self.core.scheduler, out);
        self.issue(BackendCommand::SetVolume(effective));
        Ok(())
    }

    pub fn muted(&self) -> bool {
        self.core.state.lock().muted
    }

    pub fn set_muted(&self, muted: bool) {
        let mut out = EventBuffer::new();
        let effective = {
            let mut state = self.core.state.lock();
            state.change_muted(muted, &mut out);
            state.effective_volume()
        };
        self.core.events.dispatch_burst(&*self.core.scheduler, out);
        self.issue(BackendCommand::SetMuted(muted));
        self.issue(BackendCommand::SetVolume(effective));
    }

    // =========================================================================
    // Read-only state
    // =========================================================================

    pub fn paused(&self) -> bool {
        self.core.state.lock().paused
    }

    pub fn ended(&self) -> bool {
        self.core.state.lock().ended
    }

    pub fn seeking(&self) -> bool {
        self.core.state.lock().seeking
    }

    pub fn ready_state(&self) -> ReadyState {
        self.core.state.lock().ready_state
    }

    pub fn network_state(&self) -> NetworkState {
        self.core.state.lock().network_state
    }

    pub fn error(&self) -> Option<MediaError> {
        self.core.state.lock().error.clone()
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn autoplay(&self) -> bool {
        self.core.state.lock().autoplay
    }

    pub fn set_autoplay(&self, autoplay: bool) {
        self.core.state.lock().autoplay = autoplay;
    }

    pub fn loop_(&self) -> bool {
        self.core.state.lock().loop_
    }

    pub fn set_loop(&self, loop_: bool) {
        self.core.state.lock().loop_ = loop_;
    }

    pub fn controls(&self) -> bool {
        self.core.state.lock().controls
    }

    pub fn set_controls(&self, controls: bool) {
        self.core.state.lock().controls = controls;
    }

    pub fn preload(&self) -> Preload {
        self.core.state.lock().preload
    }

    pub fn set_preload(&self, preload: Preload) {
        self.core.state.lock().preload = preload;
    }

    pub fn poster(&self) -> Option<String> {
        self.core.state.lock().poster.clone()
    }

    pub fn set_poster(&self, poster: Option<String>) {
        self.core.state.lock().poster = poster;
    }

    // =========================================================================
    // Playback quality (remote backends)
    // =========================================================================

    pub fn playback_quality(&self) -> Option<String> {
        self.core.backend.lock().as_ref().and_then(|b| b.playback_quality())
    }

    pub fn set_playback_quality(&self, quality: impl Into<String>) {
        self.issue(BackendCommand::SetQuality(quality.into()));
    }

    pub fn available_quality_levels(&self) -> Vec<String> {
        self.core
            .backend
            .lock()
            .as_ref()
            .map(|b| b.available_quality_levels())
            .unwrap_or_default()
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn on<F>(&self, kind: MediaEventKind, callback: F) -> ListenerId
    where
        F: Fn(MediaEventKind) + Send + Sync + 'static,
    {
        self.core.events.on(kind, callback)
    }

    pub fn on_all<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(MediaEventKind) + Send + Sync + 'static,
    {
        self.core.events.on_all(callback)
    }

    pub fn off(&self, id: ListenerId) {
        self.core.events.off(id);
    }

    // =========================================================================
    // Introspection and lifecycle
    // =========================================================================

    pub fn container(&self) -> Container {
        self.core.container.clone()
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.core.registry)
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.core.scheduler)
    }

    pub fn config(&self) -> AdapterConfig {
        self.core.config.clone()
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.core.backend.lock().as_ref().map(|b| b.kind())
    }

    pub fn is_backend_ready(&self) -> bool {
        self.core.queue.lock().is_ready()
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.destroyed.load(Ordering::SeqCst)
    }

    /// True when two handles refer to the same adapter instance
    pub fn same_instance(&self, other: &MediaAdapter) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Tear the adapter down: detach and release the backend, drop pending
    /// commands. Idempotent and best-effort; never fails.
    pub fn destroy(&self) {
        if self.core.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.teardown_backend();
        self.core.queue.lock().reset();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn snapshot(&self) -> PlaybackSnapshot {
        self.core
            .backend
            .lock()
            .as_ref()
            .map(|b| b.snapshot())
            .unwrap_or_default()
    }

    fn issue(&self, command: BackendCommand) {
        if self.core.destroyed.load(Ordering::SeqCst) {
            return;
        }
        let key = command.key();
        let run_now = {
            let mut queue = self.core.queue.lock();
            match queue.schedule(command, key) {
                Scheduled::RunNow(command) => Some(command),
                Scheduled::Queued => None,
            }
        };
        if let Some(command) = run_now {
            if let Some(backend) = self.core.backend.lock().as_mut() {
                backend.command(command);
            }
        }
    }

    /// Invalidate the current binding and release its backend
    ///
    /// The binding id is replaced before the backend is touched so that
    /// any in-flight callback from the old backend is already stale by the
    /// time teardown begins.
    fn teardown_backend(&self) {
        let mut guard = self.core.backend.lock();
        *self.core.binding.lock() = BindingId::new();
        if let Some(mut backend) = guard.take() {
            backend.detach();
            backend.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    fn empty_adapter() -> (MediaAdapter, Arc<ManualScheduler>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let adapter = MediaAdapter::new(
            Container::new("stage"),
            Arc::new(Registry::new()),
            scheduler.clone() as Arc<dyn Scheduler>,
        );
        (adapter, scheduler)
    }

    #[test]
    fn test_invalid_volume_fails_and_leaves_state_untouched() {
        let (adapter, _) = empty_adapter();
        assert!(matches!(adapter.set_volume(-0.1), Err(Error::InvalidVolume(_))));
        assert!(matches!(adapter.set_volume(1.1), Err(Error::InvalidVolume(_))));
        assert_eq!(adapter.volume(), 1.0);
    }

    #[test]
    fn test_invalid_time_fails_synchronously() {
        let (adapter, _) = empty_adapter();
        assert!(matches!(
            adapter.set_current_time(-1.0),
            Err(Error::InvalidTime(_))
        ));
        assert!(adapter.set_current_time(3.5).is_ok());
    }

    #[test]
    fn test_unresolvable_source_reports_unsupported() {
        let (adapter, scheduler) = empty_adapter();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        adapter.on_all(move |kind| sink.lock().push(kind));

        adapter.set_src_url("http://example.com/clip.mp4");
        scheduler.run_until_idle();

        assert_eq!(adapter.network_state(), NetworkState::NoSource);
        let error = adapter.error().expect("error populated");
        assert_eq!(error.code, MediaErrorCode::SrcNotSupported);
        assert_eq!(*log.lock(), vec![MediaEventKind::Error]);
        // No further readyState advancement once errored.
        assert_eq!(adapter.ready_state(), ReadyState::HaveNothing);
    }

    #[test]
    fn test_commands_before_resolution_do_not_panic() {
        let (adapter, scheduler) = empty_adapter();
        adapter.play();
        adapter.set_current_time(4.0).unwrap();
        adapter.pause();
        scheduler.run_until_idle();
        assert!(adapter.paused());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let (adapter, _) = empty_adapter();
        adapter.destroy();
        adapter.destroy();
        assert!(adapter.is_destroyed());
        // Post-destroy calls are ignored rather than erroring.
        adapter.set_src_url("clip.mp4");
        assert!(adapter.src().is_empty());
    }
}
