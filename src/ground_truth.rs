use crate::error::TcxFixError;
use crate::options::TargetMode;

type Result<T> = std::result::Result<T, TcxFixError>;

pub const METERS_PER_MILE: f64 = 1609.34;

/// Per-lap targets read from a laps file, in lap order.
#[derive(Debug, Clone, PartialEq)]
pub enum GroundTruth {
    /// Lap distances, already converted to meters.
    Distances(Vec<f64>),
    /// Lap paces in seconds per mile.
    Paces(Vec<f64>),
}

impl GroundTruth {
    pub fn len(&self) -> usize {
        match self {
            GroundTruth::Distances(v) | GroundTruth::Paces(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Target distance in meters for lap `index`. In pace mode the distance
    /// is whatever the recorded duration covers at the given pace.
    pub fn target_meters(&self, index: usize, recorded_seconds: f64) -> Option<f64> {
        match self {
            GroundTruth::Distances(v) => v.get(index).copied(),
            GroundTruth::Paces(v) => v
                .get(index)
                .map(|pace| miles_to_meters(recorded_seconds / pace)),
        }
    }
}

/// Parse a laps file: one value per line, blank lines ignored.
pub fn parse_ground_truth(text: &str, mode: TargetMode) -> Result<GroundTruth> {
    let mut values = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let value = match mode {
            TargetMode::Distance => parse_miles(line).map(miles_to_meters),
            TargetMode::Pace => parse_pace(line),
        };
        values.push(value.ok_or_else(|| TcxFixError::Format {
            line: idx + 1,
            text: line.to_string(),
            expected: match mode {
                TargetMode::Distance => "a distance in miles",
                TargetMode::Pace => "a M:SS pace",
            },
        })?);
    }

    Ok(match mode {
        TargetMode::Distance => GroundTruth::Distances(values),
        TargetMode::Pace => GroundTruth::Paces(values),
    })
}

fn parse_miles(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|m| m.is_finite() && *m >= 0.0)
}

/// Parse an `M:SS` pace into seconds per mile.
pub fn parse_pace(s: &str) -> Option<f64> {
    let (min, sec) = s.split_once(':')?;
    let min = min.trim().parse::<f64>().ok()?;
    let sec = sec.trim().parse::<f64>().ok()?;
    let total = min * 60.0 + sec;
    (total.is_finite() && total > 0.0).then_some(total)
}

pub fn miles_to_meters(miles: f64) -> f64 {
    miles * METERS_PER_MILE
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

/// Format a mile split as `M:SS/mi`, truncating both parts.
pub fn format_pace(miles: f64, seconds: f64) -> String {
    if miles <= 0.0 {
        return "-:--/mi".to_string();
    }
    let pace = seconds / 60.0 / miles;
    let pace_min = pace.trunc() as u64;
    let pace_sec = (pace.fract() * 60.0) as u64;
    format!("{pace_min}:{pace_sec:02}/mi")
}
