//! Command implementations

use crate::output::{emit, Format};
use anyhow::bail;
use parking_lot::Mutex;
use reel_core::backend::{library, native, remote};
use reel_core::{
    BackendKind, Container, Error, ManualScheduler, MediaAdapter, MediaEventKind, Registry,
    Scheduler, Source,
};
use reel_nested::{NestedOptions, NestedSession, SessionContext, TimelineEvent, TimelinePlugin};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Registry with all three kinds registered
///
/// Library and remote constructions fail cleanly: the CLI carries no real
/// player integrations, but capability answers stay honest.
fn inspection_registry(simulated_duration: f64) -> Registry {
    let mut registry = Registry::new();
    registry.register(remote::registration(Arc::new(|_| {
        Err(Error::BackendConstruction(
            "no remote player integration in the CLI".to_string(),
        ))
    })));
    registry.register(library::registration(Arc::new(|_| {
        Err(Error::BackendConstruction(
            "no library player integration in the CLI".to_string(),
        ))
    })));
    registry.register(native::registration(native::fixed_duration(
        simulated_duration,
    )));
    registry
}

pub fn resolve(sources: &[String], format: Format) -> anyhow::Result<()> {
    if sources.is_empty() {
        bail!("at least one source is required");
    }
    let registry = inspection_registry(0.0);
    let container = Container::new("inspect");
    let descriptors: Vec<Source> = sources.iter().map(|s| Source::new(s.clone())).collect();
    let resolved = registry.resolve(&container, &descriptors);

    emit(
        format,
        &json!({
            "sources": sources,
            "backend": resolved.map(|r| r.kind.to_string()),
            "supported": resolved.is_some(),
        }),
    )
}

pub fn canplay(mime: &str, format: Format) -> anyhow::Result<()> {
    let registry = inspection_registry(0.0);
    emit(
        format,
        &json!({
            "mime": mime,
            "answer": registry.can_play_type(mime).as_str(),
        }),
    )
}

pub fn simulate(
    source: &str,
    duration: f64,
    play: bool,
    seek: Option<f64>,
    run_ms: u64,
    format: Format,
) -> anyhow::Result<()> {
    let scheduler = Arc::new(ManualScheduler::new());
    let registry = Arc::new(inspection_registry(duration));
    let adapter = MediaAdapter::new(
        Container::new("stage"),
        registry,
        scheduler.clone() as Arc<dyn Scheduler>,
    );

    let events: Arc<Mutex<Vec<(u64, MediaEventKind)>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let events = Arc::clone(&events);
        let clock = Arc::clone(&scheduler);
        adapter.on_all(move |kind| {
            events.lock().push((clock.now().as_millis() as u64, kind));
        });
    }

    adapter.set_src_url(source);
    scheduler.run_until_idle();
    if let Some(seek) = seek {
        adapter.set_current_time(seek)?;
    }
    if play {
        adapter.play();
    }
    scheduler.run_until_idle();
    scheduler.advance(Duration::from_millis(run_ms));

    let recorded: Vec<serde_json::Value> = events
        .lock()
        .iter()
        .map(|(at, kind)| json!({ "at_ms": at, "event": kind.as_str() }))
        .collect();

    emit(
        format,
        &json!({
            "source": source,
            "events": recorded,
            "final": {
                "ready_state": adapter.ready_state().as_u8(),
                "network_state": adapter.network_state().as_u8(),
                "current_time": adapter.current_time(),
                "duration": if adapter.duration().is_nan() { None } else { Some(adapter.duration()) },
                "paused": adapter.paused(),
                "ended": adapter.ended(),
                "error": adapter.error().map(|e| e.to_string()),
            }
        }),
    )
}

#[allow(clippy::too_many_arguments)]
pub fn nested(
    source: &str,
    parent_time: f64,
    start: f64,
    end: f64,
    from: f64,
    to: Option<f64>,
    duration: f64,
    format: Format,
) -> anyhow::Result<()> {
    let scheduler = Arc::new(ManualScheduler::new());
    let registry = Arc::new(inspection_registry(duration));

    let parent = MediaAdapter::new(
        Container::new("parent"),
        Arc::clone(&registry),
        scheduler.clone() as Arc<dyn Scheduler>,
    );
    parent.set_src_url("parent.mp4");
    scheduler.run_until_idle();
    parent.play();
    scheduler.run_until_idle();
    parent.set_current_time(parent_time)?;
    scheduler.run_until_idle();

    let options = NestedOptions {
        start,
        end,
        source: vec![Source::new(source)],
        from: Some(from),
        to,
        ..NestedOptions::default()
    };
    let ctx = SessionContext::new(
        registry,
        scheduler.clone() as Arc<dyn Scheduler>,
        Container::new("nested"),
        Url::parse("http://localhost/")?,
    );
    let mut session = NestedSession::new(parent.clone(), options, ctx);
    scheduler.run_until_idle();
    session.start(&TimelineEvent::at(parent_time));
    scheduler.run_until_idle();

    let nested = session.nested();
    let (trim_from, trim_to) = session.trim();
    emit(
        format,
        &json!({
            "parent_time": parent_time,
            "window": [start, end],
            "trim": [trim_from, if trim_to.is_finite() { Some(trim_to) } else { None }],
            "backend": nested.as_ref().and_then(|n| n.backend_kind()).map(|k: BackendKind| k.to_string()),
            "nested_time": nested.as_ref().map(|n| n.current_time()),
            "playing": nested.as_ref().map(|n| !n.paused()),
        }),
    )
}
