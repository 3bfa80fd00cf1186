//! Adapter configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and heuristic knobs shared by the backend bridges
///
/// Defaults reproduce production behavior; tests compress the intervals to
/// keep virtual-clock runs short.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Playback-position poll period for backends without native
    /// seeking/timeupdate signals
    #[serde(with = "duration_millis")]
    pub position_poll: Duration,
    /// Buffered-amount poll period for backends without progress events
    #[serde(with = "duration_millis")]
    pub buffered_poll: Duration,
    /// Retry backoff while waiting for a backend to report a real duration
    #[serde(with = "duration_millis")]
    pub duration_retry: Duration,
    /// Silence window after which a loading backend is considered stalled
    #[serde(with = "duration_millis")]
    pub stall_timeout: Duration,
    /// Period of the synthesized `timeupdate` stream during playback
    #[serde(with = "duration_millis")]
    pub timeupdate_interval: Duration,
    /// Position jump (seconds) beyond which a polled delta is treated as a
    /// seek rather than natural advancement
    pub seek_jump_threshold: f64,
    /// Tolerance (seconds) for deciding a commanded seek has arrived;
    /// remote backends land near, not on, the requested time
    pub seek_settle_tolerance: f64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            position_poll: Duration::from_millis(10),
            buffered_poll: Duration::from_millis(50),
            duration_retry: Duration::from_millis(50),
            stall_timeout: Duration::from_secs(3),
            timeupdate_interval: Duration::from_millis(250),
            seek_jump_threshold: 1.0,
            seek_settle_tolerance: 1.0,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
