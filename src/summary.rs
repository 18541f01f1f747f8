use serde::Serialize;

use crate::ground_truth::{format_pace, meters_to_miles};

/// What happened to one lap, for display or JSON output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LapSummary {
    /// 1-based lap number.
    pub lap: usize,
    pub original_meters: f64,
    pub corrected_meters: f64,
    /// Corrected distance of all previous laps.
    pub meters_before: f64,
    pub seconds: f64,
    pub split: String,
    pub trimmed_points: usize,
}

impl LapSummary {
    /// One console line, matching the per-lap log output.
    pub fn line(&self) -> String {
        let miles = meters_to_miles(self.corrected_meters);
        format!(
            "lap {}\t::\t{:.3}km -> {:.3}km (total={:.3}km)\tdist={:.3}\ttime={}\tsplit={}",
            self.lap,
            self.original_meters / 1000.0,
            round2(self.corrected_meters) / 1000.0,
            self.meters_before / 1000.0,
            miles,
            self.seconds,
            self.split,
        )
    }
}

/// Totals over the whole activity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionSummary {
    pub laps: Vec<LapSummary>,
    pub total_meters: f64,
    pub total_miles: f64,
    /// Sum of the corrected lap durations.
    pub total_seconds: f64,
    /// Elapsed time of the activity as recorded, pauses included.
    pub original_total_seconds: f64,
    pub split: String,
}

impl CorrectionSummary {
    pub fn total_line(&self) -> String {
        format!(
            "-> Total\tkm={:.3}\tmiles={:.3}\tsplit={}",
            self.total_meters / 1000.0,
            self.total_miles,
            self.split
        )
    }

    pub fn time_line(&self) -> String {
        format!("-> {} -> {}", self.original_total_seconds, self.total_seconds)
    }
}

/// Running totals carried from lap to lap.
#[derive(Debug, Default)]
pub struct RunningTotals {
    pub meters: f64,
    pub seconds: f64,
    pub original_seconds: f64,
    laps: Vec<LapSummary>,
}

impl RunningTotals {
    /// Record a corrected lap and advance the distance and time totals.
    pub fn add_lap(
        &mut self,
        original_meters: f64,
        corrected_meters: f64,
        seconds: f64,
        trimmed_points: usize,
    ) -> &LapSummary {
        let summary = LapSummary {
            lap: self.laps.len() + 1,
            original_meters,
            corrected_meters,
            meters_before: self.meters,
            seconds,
            split: format_pace(meters_to_miles(corrected_meters), seconds),
            trimmed_points,
        };
        self.meters += corrected_meters;
        self.seconds += seconds;
        self.laps.push(summary);
        &self.laps[self.laps.len() - 1]
    }

    pub fn finish(self) -> CorrectionSummary {
        let total_miles = meters_to_miles(self.meters);
        CorrectionSummary {
            split: format_pace(total_miles, self.seconds),
            laps: self.laps,
            total_meters: self.meters,
            total_miles,
            total_seconds: self.seconds,
            original_total_seconds: self.original_seconds,
        }
    }
}

/// Round to two decimals, the precision lap distances are stored with.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
