//! Source descriptors and capability lookup
//!
//! A source is a bare URL or a `{url, type}` pair; adapters accept one or
//! an ordered candidate list. Capability answers come from the declared
//! MIME type when present, otherwise from the extension table, otherwise
//! from kind-specific URL patterns. Nested playback appends a `#t=from,to`
//! trim fragment to the URLs it builds, so equivalence checks resolve
//! relative references against a base and ignore that fragment.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// One candidate media source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SourceRepr")]
pub struct Source {
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: None,
        }
    }

    pub fn with_type(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: Some(mime_type.into()),
        }
    }
}

impl From<&str> for Source {
    fn from(url: &str) -> Self {
        Source::new(url)
    }
}

impl From<String> for Source {
    fn from(url: String) -> Self {
        Source::new(url)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceRepr {
    Bare(String),
    Full {
        url: String,
        #[serde(rename = "type", default)]
        mime_type: Option<String>,
    },
}

impl From<SourceRepr> for Source {
    fn from(repr: SourceRepr) -> Self {
        match repr {
            SourceRepr::Bare(url) => Source::new(url),
            SourceRepr::Full { url, mime_type } => Source { url, mime_type },
        }
    }
}

/// Capability answer, standard media-element vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanPlay {
    Probably,
    Maybe,
    #[serde(rename = "")]
    Empty,
}

impl CanPlay {
    pub fn as_str(self) -> &'static str {
        match self {
            CanPlay::Probably => "probably",
            CanPlay::Maybe => "maybe",
            CanPlay::Empty => "",
        }
    }

    /// The resolver treats anything non-empty as playable
    pub fn is_positive(self) -> bool {
        self != CanPlay::Empty
    }
}

/// Coarse media category, used to pick the element tag for native playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

const EXTENSION_TABLE: &[(&str, &str, MediaKind)] = &[
    ("webm", "video/webm", MediaKind::Video),
    ("mp4", "video/mp4", MediaKind::Video),
    ("m4v", "video/m4v", MediaKind::Video),
    ("ogv", "video/ogg", MediaKind::Video),
    ("flv", "video/flv", MediaKind::Video),
    ("mp3", "audio/mpeg", MediaKind::Audio),
    ("oga", "audio/ogg", MediaKind::Audio),
    ("ogg", "audio/ogg", MediaKind::Audio),
    ("aac", "audio/aac", MediaKind::Audio),
    ("wav", "audio/wav", MediaKind::Audio),
];

/// File extension of a URL, ignoring query and fragment
pub fn extension_of(url: &str) -> Option<&str> {
    let path = url.split(['#', '?']).next().unwrap_or(url);
    let (_, ext) = path.rsplit_once('.')?;
    if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}

/// True when a MIME type appears in the known extension table
pub fn mime_is_known(mime: &str) -> bool {
    EXTENSION_TABLE.iter().any(|(_, m, _)| *m == mime)
}

/// MIME type for a known file extension
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    EXTENSION_TABLE
        .iter()
        .find(|(e, _, _)| *e == ext)
        .map(|(_, mime, _)| *mime)
}

/// Effective MIME type of a source: declared type, else extension lookup
pub fn mime_of(source: &Source) -> Option<&str> {
    if let Some(mime) = source.mime_type.as_deref() {
        return Some(mime);
    }
    extension_of(&source.url).and_then(mime_for_extension)
}

/// Guess whether a candidate list is video or audio from its extensions
pub fn guess_media_kind(sources: &[Source]) -> Option<MediaKind> {
    for source in sources {
        if let Some(ext) = extension_of(&source.url) {
            let ext = ext.to_ascii_lowercase();
            if let Some((_, _, kind)) = EXTENSION_TABLE.iter().find(|(e, _, _)| *e == ext) {
                return Some(*kind);
            }
        }
    }
    None
}

// =============================================================================
// Trim fragments and normalization
// =============================================================================

/// A `#t=from[,to]` media-fragment trim descriptor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimFragment {
    pub from: f64,
    pub to: Option<f64>,
}

impl TrimFragment {
    /// Parse the payload of a `t=` fragment (`"2"`, `"2,6"`, `",6"`)
    pub fn parse(payload: &str) -> Option<Self> {
        let (from_part, to_part) = match payload.split_once(',') {
            Some((f, t)) => (f, Some(t)),
            None => (payload, None),
        };
        let from = if from_part.is_empty() {
            0.0
        } else {
            from_part.parse::<f64>().ok()?
        };
        let to = match to_part {
            Some(t) if !t.is_empty() => Some(t.parse::<f64>().ok()?),
            _ => None,
        };
        Some(Self { from, to })
    }

    pub fn to_fragment(self) -> String {
        match self.to {
            Some(to) => format!("t={},{}", self.from, to),
            None => format!("t={}", self.from),
        }
    }
}

/// Split a URL into its pre-fragment part and any trim descriptor
pub fn split_trim_fragment(url: &str) -> (&str, Option<TrimFragment>) {
    match url.split_once('#') {
        Some((head, fragment)) => {
            let trim = fragment
                .strip_prefix("t=")
                .and_then(TrimFragment::parse);
            (head, trim)
        }
        None => (url, None),
    }
}

/// Append a trim descriptor to a URL, replacing any existing fragment
pub fn with_trim_fragment(url: &str, trim: TrimFragment) -> String {
    let (head, _) = split_trim_fragment(url);
    format!("{}#{}", head, trim.to_fragment())
}

/// Resolve a possibly-relative source URL against a base
pub fn normalize(raw: &str, base: &Url) -> Result<Url> {
    base.join(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))
}

/// True when two source URLs name the same resource
///
/// Both are resolved against `base` and compared with fragments stripped,
/// so `media/clip.mp4#t=0,6` equals `http://host/media/clip.mp4`.
pub fn normalized_equal(a: &str, b: &str, base: &Url) -> bool {
    let strip = |raw: &str| -> Option<Url> {
        let mut url = normalize(raw, base).ok()?;
        url.set_fragment(None);
        Some(url)
    };
    match (strip(a), strip(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://media.example.com/shows/").unwrap()
    }

    #[test]
    fn test_extension_lookup() {
        assert_eq!(extension_of("http://x/clip.webm"), Some("webm"));
        assert_eq!(extension_of("clip.mp4?cache=1"), Some("mp4"));
        assert_eq!(extension_of("clip.mp4#t=1,2"), Some("mp4"));
        assert_eq!(extension_of("http://x/noext"), None);
        assert_eq!(mime_for_extension("OGV"), Some("video/ogg"));
        assert_eq!(mime_for_extension("doc"), None);
    }

    #[test]
    fn test_mime_of_prefers_declared_type() {
        let source = Source::with_type("clip.mp4", "video/webm");
        assert_eq!(mime_of(&source), Some("video/webm"));
        assert_eq!(mime_of(&Source::new("clip.mp4")), Some("video/mp4"));
        assert_eq!(mime_of(&Source::new("clip.xyz")), None);
    }

    #[test]
    fn test_guess_media_kind_takes_first_known_extension() {
        let sources = vec![Source::new("a.xyz"), Source::new("b.oga"), Source::new("c.mp4")];
        assert_eq!(guess_media_kind(&sources), Some(MediaKind::Audio));
        assert_eq!(guess_media_kind(&[Source::new("x.bin")]), None);
    }

    #[test]
    fn test_trim_fragment_round_trip() {
        let (head, trim) = split_trim_fragment("clip.mp4#t=1.5,6");
        assert_eq!(head, "clip.mp4");
        assert_eq!(
            trim,
            Some(TrimFragment {
                from: 1.5,
                to: Some(6.0)
            })
        );

        let url = with_trim_fragment("clip.mp4", TrimFragment { from: 2.0, to: None });
        assert_eq!(url, "clip.mp4#t=2");
        let url = with_trim_fragment(&url, TrimFragment { from: 0.0, to: Some(4.0) });
        assert_eq!(url, "clip.mp4#t=0,4");
    }

    #[test]
    fn test_non_trim_fragment_is_ignored() {
        let (head, trim) = split_trim_fragment("clip.mp4#chapter-2");
        assert_eq!(head, "clip.mp4");
        assert_eq!(trim, None);
    }

    #[test]
    fn test_normalized_equal_resolves_relative_and_strips_trim() {
        let base = base();
        assert!(normalized_equal(
            "clip.mp4#t=0,6",
            "http://media.example.com/shows/clip.mp4",
            &base
        ));
        assert!(normalized_equal("clip.mp4", "./clip.mp4#t=2", &base));
        assert!(!normalized_equal("clip.mp4", "other.mp4", &base));
    }

    #[test]
    fn test_source_deserializes_from_bare_string_and_object() {
        let bare: Source = serde_json::from_str("\"clip.mp4\"").unwrap();
        assert_eq!(bare, Source::new("clip.mp4"));
        let full: Source =
            serde_json::from_str("{\"url\": \"clip.mp4\", \"type\": \"video/mp4\"}").unwrap();
        assert_eq!(full, Source::with_type("clip.mp4", "video/mp4"));
    }
}
