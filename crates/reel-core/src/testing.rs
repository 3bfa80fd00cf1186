//! Scripted fake players
//!
//! Deterministic [`LibraryPlayer`] and [`RemotePlayer`] implementations for
//! tests and embedder experiments. Nothing happens on its own: the control
//! handles mutate the simulated player and emit its events exactly when
//! the test says so, which pairs with [`ManualScheduler`] to make whole
//! playback scenarios single-stepped.
//!
//! [`ManualScheduler`]: crate::scheduler::ManualScheduler

use crate::backend::library::{LibraryEventHandler, LibraryPlayer, SharedLibraryPlayer};
use crate::backend::remote::{
    RemoteEvent, RemoteEventHandler, RemotePlayer, SharedRemotePlayer,
};
use parking_lot::Mutex;
use std::sync::Arc;

// =============================================================================
// Library player fake
// =============================================================================

#[derive(Default)]
struct LibraryState {
    handler: Option<LibraryEventHandler>,
    ready: bool,
    ready_callbacks: Vec<Box<dyn FnOnce() + Send>>,
    position: f64,
    duration: f64,
    buffered_end: f64,
    volume: f64,
    muted: bool,
    error: Option<(u32, String)>,
    loads: Vec<String>,
    play_calls: usize,
    pause_calls: usize,
    seeks: Vec<f64>,
    destroyed: bool,
    destroy_fault: Option<String>,
}

/// Scripted wrapped-library player
pub struct FakeLibraryPlayer {
    state: Arc<Mutex<LibraryState>>,
}

/// Test-side handle driving a [`FakeLibraryPlayer`]
#[derive(Clone)]
pub struct LibraryControl {
    state: Arc<Mutex<LibraryState>>,
}

impl FakeLibraryPlayer {
    /// Build a shared player plus its control handle
    pub fn create() -> (SharedLibraryPlayer, LibraryControl) {
        let state = Arc::new(Mutex::new(LibraryState {
            volume: 1.0,
            ..LibraryState::default()
        }));
        let control = LibraryControl {
            state: Arc::clone(&state),
        };
        let player: SharedLibraryPlayer =
            Arc::new(Mutex::new(Box::new(FakeLibraryPlayer { state })));
        (player, control)
    }
}

impl LibraryControl {
    /// Flip to ready and run queued readiness callbacks
    pub fn become_ready(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            state.ready = true;
            std::mem::take(&mut state.ready_callbacks)
        };
        for callback in callbacks {
            callback();
        }
    }

    /// Emit a named player event to the installed handler
    pub fn emit(&self, name: &str) {
        let mut handler = self.state.lock().handler.take();
        if let Some(handler) = handler.as_mut() {
            handler(name);
        }
        let mut state = self.state.lock();
        if state.handler.is_none() {
            state.handler = handler;
        }
    }

    pub fn set_duration(&self, duration: f64) {
        self.state.lock().duration = duration;
    }

    pub fn set_position(&self, position: f64) {
        self.state.lock().position = position;
    }

    pub fn set_buffered_end(&self, buffered_end: f64) {
        self.state.lock().buffered_end = buffered_end;
    }

    pub fn set_volume_state(&self, volume: f64, muted: bool) {
        let mut state = self.state.lock();
        state.volume = volume;
        state.muted = muted;
    }

    pub fn set_error(&self, code: u32, message: &str) {
        self.state.lock().error = Some((code, message.to_string()));
    }

    pub fn fail_destroy(&self, fault: &str) {
        self.state.lock().destroy_fault = Some(fault.to_string());
    }

    pub fn loads(&self) -> Vec<String> {
        self.state.lock().loads.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().pause_calls
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().seeks.clone()
    }

    pub fn destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    pub fn has_handler(&self) -> bool {
        self.state.lock().handler.is_some()
    }
}

impl LibraryPlayer for FakeLibraryPlayer {
    fn set_event_handler(&mut self, handler: LibraryEventHandler) {
        self.state.lock().handler = Some(handler);
    }

    fn clear_event_handler(&mut self) {
        self.state.lock().handler = None;
    }

    fn when_ready(&mut self, callback: Box<dyn FnOnce() + Send>) {
        let run_now = {
            let mut state = self.state.lock();
            if state.ready {
                true
            } else {
                state.ready_callbacks.push(callback);
                return;
            }
        };
        if run_now {
            callback();
        }
    }

    fn load(&mut self, url: &str) {
        self.state.lock().loads.push(url.to_string());
    }

    fn play(&mut self) {
        self.state.lock().play_calls += 1;
    }

    fn pause(&mut self) {
        self.state.lock().pause_calls += 1;
    }

    fn position(&self) -> f64 {
        self.state.lock().position
    }

    fn set_position(&mut self, time: f64) {
        let mut state = self.state.lock();
        state.seeks.push(time);
        state.position = time;
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn buffered_end(&self) -> f64 {
        self.state.lock().buffered_end
    }

    fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.state.lock().volume = volume;
    }

    fn muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn error(&self) -> Option<(u32, String)> {
        self.state.lock().error.clone()
    }

    fn destroy(&mut self) -> Result<(), String> {
        let mut state = self.state.lock();
        state.destroyed = true;
        match state.destroy_fault.take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Remote player fake
// =============================================================================

#[derive(Default)]
struct RemoteState {
    handler: Option<RemoteEventHandler>,
    position: f64,
    duration: f64,
    loaded_fraction: f64,
    volume: f64,
    muted: bool,
    quality: String,
    quality_levels: Vec<String>,
    loads: Vec<String>,
    play_calls: usize,
    pause_calls: usize,
    seeks: Vec<f64>,
    stopped: bool,
    destroyed: bool,
}

/// Scripted remote embedded player
pub struct FakeRemotePlayer {
    state: Arc<Mutex<RemoteState>>,
}

/// Test-side handle driving a [`FakeRemotePlayer`]
#[derive(Clone)]
pub struct RemoteControl {
    state: Arc<Mutex<RemoteState>>,
}

impl FakeRemotePlayer {
    /// Build a shared player plus its control handle
    pub fn create() -> (SharedRemotePlayer, RemoteControl) {
        let state = Arc::new(Mutex::new(RemoteState {
            volume: 1.0,
            quality: "default".to_string(),
            quality_levels: vec!["hd720".to_string(), "medium".to_string()],
            ..RemoteState::default()
        }));
        let control = RemoteControl {
            state: Arc::clone(&state),
        };
        let player: SharedRemotePlayer =
            Arc::new(Mutex::new(Box::new(FakeRemotePlayer { state })));
        (player, control)
    }
}

impl RemoteControl {
    /// Emit a remote event to the installed handler
    pub fn emit(&self, event: RemoteEvent) {
        let mut handler = self.state.lock().handler.take();
        if let Some(handler) = handler.as_mut() {
            handler(event);
        }
        let mut state = self.state.lock();
        if state.handler.is_none() {
            state.handler = handler;
        }
    }

    pub fn set_duration(&self, duration: f64) {
        self.state.lock().duration = duration;
    }

    pub fn set_position(&self, position: f64) {
        self.state.lock().position = position;
    }

    pub fn set_loaded_fraction(&self, fraction: f64) {
        self.state.lock().loaded_fraction = fraction;
    }

    pub fn loads(&self) -> Vec<String> {
        self.state.lock().loads.clone()
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().play_calls
    }

    pub fn pause_calls(&self) -> usize {
        self.state.lock().pause_calls
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().seeks.clone()
    }

    pub fn quality(&self) -> String {
        self.state.lock().quality.clone()
    }

    pub fn stopped(&self) -> bool {
        self.state.lock().stopped
    }

    pub fn destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    pub fn has_handler(&self) -> bool {
        self.state.lock().handler.is_some()
    }
}

impl RemotePlayer for FakeRemotePlayer {
    fn set_event_handler(&mut self, handler: RemoteEventHandler) {
        self.state.lock().handler = Some(handler);
    }

    fn clear_event_handler(&mut self) {
        self.state.lock().handler = None;
    }

    fn load(&mut self, media_id: &str) {
        self.state.lock().loads.push(media_id.to_string());
    }

    fn play(&mut self) {
        self.state.lock().play_calls += 1;
    }

    fn pause(&mut self) {
        self.state.lock().pause_calls += 1;
    }

    fn stop(&mut self) -> Result<(), String> {
        self.state.lock().stopped = true;
        Ok(())
    }

    fn seek_to(&mut self, time: f64) {
        let mut state = self.state.lock();
        state.seeks.push(time);
        state.position = time;
    }

    fn position(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn loaded_fraction(&self) -> f64 {
        self.state.lock().loaded_fraction
    }

    fn set_volume(&mut self, volume: f64) {
        self.state.lock().volume = volume;
    }

    fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    fn mute(&mut self) {
        self.state.lock().muted = true;
    }

    fn unmute(&mut self) {
        self.state.lock().muted = false;
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn playback_quality(&self) -> String {
        self.state.lock().quality.clone()
    }

    fn set_playback_quality(&mut self, quality: &str) {
        self.state.lock().quality = quality.to_string();
    }

    fn available_quality_levels(&self) -> Vec<String> {
        self.state.lock().quality_levels.clone()
    }

    fn destroy(&mut self) -> Result<(), String> {
        self.state.lock().destroyed = true;
        Ok(())
    }
}
