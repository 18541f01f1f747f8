use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

/// Largest accepted gap, in seconds, between the trimmed trackpoint span and
/// the lap's recorded `TotalTimeSeconds`.
pub const DURATION_TOLERANCE_SECS: f64 = 2.0;

/// Options for correcting a TCX activity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionOptions {
    /// How the lap duration is obtained (default: verify against trackpoints)
    #[serde(default)]
    pub duration: DurationPolicy,

    /// Where the device is expected to have paused (default: between laps)
    #[serde(default)]
    pub pause: PausePolicy,

    /// What the laps file contains (default: distances in miles)
    #[serde(default)]
    pub target: TargetMode,
}

impl CorrectionOptions {
    /// Build options from the three independent command-line switches.
    pub fn from_flags(use_recorded_time: bool, midlap_pause: bool, set_pace: bool) -> Self {
        Self {
            duration: if use_recorded_time {
                DurationPolicy::TrustRecorded
            } else {
                DurationPolicy::Verify
            },
            pause: if midlap_pause {
                PausePolicy::MidLap
            } else {
                PausePolicy::InterLap
            },
            target: if set_pace {
                TargetMode::Pace
            } else {
                TargetMode::Distance
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DurationPolicy {
    /// Measure the lap from its trackpoints and cross-check the recorded time.
    #[default]
    Verify,
    /// Use `TotalTimeSeconds` as the lap duration without checking.
    TrustRecorded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PausePolicy {
    /// Pauses only happen between laps; each lap is shifted as a block.
    #[default]
    InterLap,
    /// Pauses happen inside laps (treadmill); points are re-spaced one second apart.
    MidLap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetMode {
    /// One lap distance in miles per line.
    #[default]
    Distance,
    /// One `M:SS` pace per mile per line.
    Pace,
}

/// How the trackpoints of one lap get their new timestamps.
///
/// `Shift(None)` leaves timestamps alone; that is the first lap in
/// inter-lap mode, which has no previous lap to close the gap to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retime {
    Shift(Option<TimeDelta>),
    Cadence { start: DateTime<Utc> },
}

impl Retime {
    /// New timestamp for the point at `ordinal` (0-based, after trimming)
    /// whose recorded time is `original`. `None` when the result falls
    /// outside the representable date range.
    pub fn apply(&self, original: DateTime<Utc>, ordinal: usize) -> Option<DateTime<Utc>> {
        match *self {
            Retime::Shift(Some(adjust)) => original.checked_sub_signed(adjust),
            Retime::Shift(None) => Some(original),
            Retime::Cadence { start } => {
                let offset = TimeDelta::try_seconds(i64::try_from(ordinal).ok()?)?;
                start.checked_add_signed(offset)
            }
        }
    }
}
