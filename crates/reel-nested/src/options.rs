//! Synchronizer options
//!
//! Deserializable from the host's JSON track-event descriptors: sources
//! accept a bare URL, a newline-separated URL block, or a descriptor list;
//! trim bounds accept seconds or `hh:mm:ss` timecodes; volume accepts a
//! number or the follow-parent flag.

use reel_core::{BackendKind, Source};
use serde::{Deserialize, Deserializer, Serialize};

/// How the nested adapter's volume tracks the parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumePolicy {
    /// Mirror the parent's volume and mute while the session lives
    FollowParent,
    /// Explicit numeric override in `[0, 1]`
    Fixed(f64),
}

/// One nested sub-behavior bound to the nested adapter's own timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedEventDescriptor {
    /// Stable identity used to diff behavior sets across updates
    pub id: String,
    /// Behavior kind, matched against the behavior registry
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub start: f64,
    #[serde(default = "unbounded")]
    pub end: f64,
    /// Behavior-specific configuration, passed through opaquely
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Full option set for one nested playback session
#[derive(Debug, Clone, Deserialize)]
pub struct NestedOptions {
    /// Parent-timeline second at which the session's window opens
    #[serde(default)]
    pub start: f64,
    /// Parent-timeline second at which the window closes
    #[serde(default = "unbounded")]
    pub end: f64,
    #[serde(default, deserialize_with = "de_sources")]
    pub source: Vec<Source>,
    /// Trim-in inside the nested medium
    #[serde(default, deserialize_with = "de_time")]
    pub from: Option<f64>,
    /// Trim-out inside the nested medium
    #[serde(default, deserialize_with = "de_time")]
    pub to: Option<f64>,
    /// Keep the nested clock locked to the parent clock
    #[serde(default = "default_true")]
    pub sync: bool,
    #[serde(default, deserialize_with = "de_volume")]
    pub volume: Option<VolumePolicy>,
    #[serde(default)]
    pub controls: bool,
    #[serde(default)]
    pub poster: Option<String>,
    /// Force a backend kind instead of resolving from the source
    #[serde(default, rename = "mediaType")]
    pub media_type: Option<BackendKind>,
    #[serde(default)]
    pub events: Vec<NestedEventDescriptor>,
    /// Host container id override
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Default for NestedOptions {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: f64::INFINITY,
            source: Vec::new(),
            from: None,
            to: None,
            sync: true,
            volume: None,
            controls: false,
            poster: None,
            media_type: None,
            events: Vec::new(),
            container: None,
            tag: None,
            id: None,
        }
    }
}

/// Partial option set passed to `update`; absent fields are unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedUpdate {
    #[serde(default, deserialize_with = "de_sources_opt")]
    pub source: Option<Vec<Source>>,
    #[serde(default, deserialize_with = "de_time")]
    pub from: Option<f64>,
    #[serde(default, deserialize_with = "de_time")]
    pub to: Option<f64>,
    #[serde(default)]
    pub sync: Option<bool>,
    #[serde(default, deserialize_with = "de_volume")]
    pub volume: Option<VolumePolicy>,
    #[serde(default, rename = "mediaType")]
    pub media_type: Option<BackendKind>,
    #[serde(default)]
    pub events: Option<Vec<NestedEventDescriptor>>,
}

fn default_true() -> bool {
    true
}

fn unbounded() -> f64 {
    f64::INFINITY
}

/// Parse `ss`, `mm:ss`, or `hh:mm:ss[.frac]` into seconds
pub fn parse_timecode(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut seconds = 0.0;
    for part in text.split(':') {
        let value = part.parse::<f64>().ok()?;
        if value < 0.0 {
            return None;
        }
        seconds = seconds * 60.0 + value;
    }
    Some(seconds)
}

fn de_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Seconds(f64),
        Timecode(String),
    }
    match Option::<Repr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Repr::Seconds(seconds)) => Ok(Some(seconds)),
        Some(Repr::Timecode(text)) => parse_timecode(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timecode: {text}"))),
    }
}

fn de_volume<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<VolumePolicy>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Flag(bool),
        Level(f64),
        Label(String),
    }
    match Option::<Repr>::deserialize(deserializer)? {
        None | Some(Repr::Flag(false)) => Ok(None),
        Some(Repr::Flag(true)) => Ok(Some(VolumePolicy::FollowParent)),
        Some(Repr::Level(level)) => {
            if !(0.0..=1.0).contains(&level) {
                return Err(serde::de::Error::custom(format!(
                    "volume out of range: {level}"
                )));
            }
            Ok(Some(VolumePolicy::Fixed(level)))
        }
        Some(Repr::Label(label)) if label == "follow-parent" => {
            Ok(Some(VolumePolicy::FollowParent))
        }
        Some(Repr::Label(label)) => Err(serde::de::Error::custom(format!(
            "unknown volume policy: {label}"
        ))),
    }
}

fn sources_from_repr(repr: SourcesRepr) -> Vec<Source> {
    match repr {
        SourcesRepr::Many(sources) => sources,
        SourcesRepr::One(source) => {
            if source.mime_type.is_none() && source.url.contains('\n') {
                source
                    .url
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(Source::new)
                    .collect()
            } else {
                vec![source]
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourcesRepr {
    One(Source),
    Many(Vec<Source>),
}

fn de_sources<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Source>, D::Error> {
    Ok(Option::<SourcesRepr>::deserialize(deserializer)?
        .map(sources_from_repr)
        .unwrap_or_default())
}

fn de_sources_opt<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<Source>>, D::Error> {
    Ok(Option::<SourcesRepr>::deserialize(deserializer)?.map(sources_from_repr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timecode_parsing() {
        assert_eq!(parse_timecode("42"), Some(42.0));
        assert_eq!(parse_timecode("1:30"), Some(90.0));
        assert_eq!(parse_timecode("01:02:03.5"), Some(3723.5));
        assert_eq!(parse_timecode("x"), None);
        assert_eq!(parse_timecode(""), None);
    }

    #[test]
    fn test_options_from_minimal_descriptor() {
        let options: NestedOptions =
            serde_json::from_str(r#"{"start": 1, "end": 4, "source": "clip.mp4"}"#).unwrap();
        assert_eq!(options.start, 1.0);
        assert_eq!(options.end, 4.0);
        assert_eq!(options.source, vec![Source::new("clip.mp4")]);
        assert!(options.sync);
        assert!(options.volume.is_none());
    }

    #[test]
    fn test_source_block_splits_on_newlines() {
        let options: NestedOptions =
            serde_json::from_str("{\"source\": \"a.mp4\\nb.webm\"}").unwrap();
        assert_eq!(
            options.source,
            vec![Source::new("a.mp4"), Source::new("b.webm")]
        );
    }

    #[test]
    fn test_volume_policies() {
        let follow: NestedOptions = serde_json::from_str(r#"{"volume": true}"#).unwrap();
        assert_eq!(follow.volume, Some(VolumePolicy::FollowParent));

        let label: NestedOptions =
            serde_json::from_str(r#"{"volume": "follow-parent"}"#).unwrap();
        assert_eq!(label.volume, Some(VolumePolicy::FollowParent));

        let fixed: NestedOptions = serde_json::from_str(r#"{"volume": 0.6}"#).unwrap();
        assert_eq!(fixed.volume, Some(VolumePolicy::Fixed(0.6)));

        let off: NestedOptions = serde_json::from_str(r#"{"volume": false}"#).unwrap();
        assert_eq!(off.volume, None);

        assert!(serde_json::from_str::<NestedOptions>(r#"{"volume": 1.5}"#).is_err());
    }

    #[test]
    fn test_trim_bounds_accept_timecodes() {
        let options: NestedOptions =
            serde_json::from_str(r#"{"from": "0:05", "to": 12.5}"#).unwrap();
        assert_eq!(options.from, Some(5.0));
        assert_eq!(options.to, Some(12.5));
    }

    #[test]
    fn test_update_is_partial() {
        let update: NestedUpdate = serde_json::from_str(r#"{"volume": 0.4}"#).unwrap();
        assert_eq!(update.volume, Some(VolumePolicy::Fixed(0.4)));
        assert!(update.source.is_none());
        assert!(update.sync.is_none());
    }

    #[test]
    fn test_event_descriptors() {
        let options: NestedOptions = serde_json::from_str(
            r#"{"events": [{"id": "cap-1", "type": "caption", "start": 0, "end": 2, "payload": {"text": "hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(options.events.len(), 1);
        assert_eq!(options.events[0].kind, "caption");
        assert_eq!(options.events[0].end, 2.0);
    }
}
