use chrono::{DateTime, Utc};

use crate::error::TcxFixError;

/// Parsed TCX data: every `<Activity>` found under `<Activities>`.
#[derive(Debug, Default)]
pub struct TcxDocument {
    pub activities: Vec<TcxActivity>,
}

impl TcxDocument {
    /// The document's only activity. Correction is defined for exactly one.
    pub fn single_activity(&self) -> Result<&TcxActivity, TcxFixError> {
        match self.activities.as_slice() {
            [activity] => Ok(activity),
            other => Err(TcxFixError::StructuralMismatch(format!(
                "expected exactly one <Activity>, found {}",
                other.len()
            ))),
        }
    }
}

/// A TCX activity (<Activity>).
#[derive(Debug, Default)]
pub struct TcxActivity {
    pub sport: Option<String>,
    pub id: Option<String>,
    pub laps: Vec<TcxLap>,
}

/// A TCX lap (<Lap>).
#[derive(Debug, Clone)]
pub struct TcxLap {
    pub start_time: DateTime<Utc>,
    pub total_time_seconds: f64,
    pub distance_meters: f64,
    /// Trackpoints of all <Track> children, in document order.
    pub points: Vec<Trackpoint>,
}

/// A single TCX sample (<Trackpoint>). `distance_meters` counts from the
/// start of the activity, not the lap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trackpoint {
    pub time: DateTime<Utc>,
    pub distance_meters: f64,
}
