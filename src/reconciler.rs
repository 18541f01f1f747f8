//! Lap reconciliation: fits every lap of an activity to its ground-truth
//! distance, trims trailing artifact samples, then rescales and retimes the
//! surviving trackpoints.
//!
//! Laps are processed strictly in order. Each lap needs the corrected end
//! time of the previous one and the corrected distance of all laps before it.

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info};

use crate::error::TcxFixError;
use crate::ground_truth::GroundTruth;
use crate::options::*;
use crate::summary::{CorrectionSummary, RunningTotals};
use crate::tcx_types::*;

type Result<T> = std::result::Result<T, TcxFixError>;

/// A trackpoint after correction. Its position in `CorrectedLap::points`
/// matches its position in the source lap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedPoint {
    pub time: DateTime<Utc>,
    pub distance_meters: f64,
}

/// One lap after correction.
#[derive(Debug, Clone)]
pub struct CorrectedLap {
    pub original_distance: f64,
    pub distance_meters: f64,
    /// New `StartTime`, when it was rewritten.
    pub start_time: Option<DateTime<Utc>>,
    pub retime: Retime,
    /// Lap duration in seconds after correction.
    pub adj_len: f64,
    /// Points dropped from the end of the lap.
    pub removed: usize,
    pub points: Vec<CorrectedPoint>,
}

#[derive(Debug, Clone)]
pub struct Correction {
    pub laps: Vec<CorrectedLap>,
    pub summary: CorrectionSummary,
}

/// Correct every lap of `activity` against `truth`.
///
/// Nothing is returned unless every lap passes; the caller writes output
/// only from a complete `Correction`.
pub fn correct_activity(
    activity: &TcxActivity,
    truth: &GroundTruth,
    opts: &CorrectionOptions,
) -> Result<Correction> {
    if activity.laps.len() != truth.len() {
        return Err(TcxFixError::StructuralMismatch(format!(
            "Found {} laps in TCX, but {} in laps file",
            activity.laps.len(),
            truth.len()
        )));
    }

    info!(
        "{} activity {}: {} laps",
        activity.sport.as_deref().unwrap_or("Unknown"),
        activity.id.as_deref().unwrap_or("(no id)"),
        activity.laps.len()
    );

    let mut totals = RunningTotals::default();
    let mut laps = Vec::with_capacity(activity.laps.len());
    let mut prev_lap_end: Option<DateTime<Utc>> = None;
    let mut prev_first_point: Option<DateTime<Utc>> = None;
    let mut last_span = 0.0;

    for (index, lap) in activity.laps.iter().enumerate() {
        let lap_no = index + 1;
        let target = truth
            .target_meters(index, lap.total_time_seconds)
            .ok_or_else(|| {
                TcxFixError::StructuralMismatch(format!("no laps file entry for lap {lap_no}"))
            })?;

        let (start_time, retime) = resolve_start(lap, prev_lap_end, opts.pause);

        let kept = trim_trailing(lap_no, &lap.points)?;
        let first = lap.points[0].time;
        if let Some(prev) = prev_first_point {
            totals.original_seconds += seconds(first - prev);
        }
        prev_first_point = Some(first);

        let (kept, adj_len) = measure_duration(lap_no, lap, kept, opts.duration)?;
        last_span = seconds(lap.points[kept - 1].time - first);
        let removed = lap.points.len() - kept;
        if removed > 0 {
            debug!("lap {lap_no}: removed {removed} trailing trackpoints");
        }

        let points = rescale_points(lap_no, lap, kept, target, totals.meters, retime)?;

        let summary = totals.add_lap(lap.distance_meters, target, adj_len, removed);
        info!("{}", summary.line());

        prev_lap_end = Some(match retime {
            Retime::Cadence { start } => seconds_delta(adj_len)
                .and_then(|d| start.checked_add_signed(d))
                .ok_or_else(|| TcxFixError::InvalidValue {
                    element: "TotalTimeSeconds",
                    value: adj_len.to_string(),
                })?,
            Retime::Shift(_) => points
                .last()
                .map(|p| p.time)
                .unwrap_or(lap.start_time),
        });

        laps.push(CorrectedLap {
            original_distance: lap.distance_meters,
            distance_meters: target,
            start_time,
            retime,
            adj_len,
            removed,
            points,
        });
    }

    totals.original_seconds += last_span;
    let summary = totals.finish();
    info!("{}", summary.total_line());
    info!("{}", summary.time_line());

    Ok(Correction { laps, summary })
}

/// Decide the lap's new `StartTime` and how its points are retimed.
///
/// Between laps the start moves back to the previous lap's corrected end,
/// and the same offset is removed from every point. With pauses inside laps
/// the start attribute stays as recorded and the points are re-spaced from
/// the previous lap's corrected end.
fn resolve_start(
    lap: &TcxLap,
    prev_lap_end: Option<DateTime<Utc>>,
    pause: PausePolicy,
) -> (Option<DateTime<Utc>>, Retime) {
    match (pause, prev_lap_end) {
        (PausePolicy::InterLap, Some(prev)) => {
            (Some(prev), Retime::Shift(Some(lap.start_time - prev)))
        }
        (PausePolicy::InterLap, None) => (None, Retime::Shift(None)),
        (PausePolicy::MidLap, prev) => (
            None,
            Retime::Cadence {
                start: prev.unwrap_or(lap.start_time),
            },
        ),
    }
}

/// Number of points to keep after dropping samples logged once the distance
/// stopped changing. Exactly one point carrying the terminal distance stays.
pub fn trim_trailing(lap_no: usize, points: &[Trackpoint]) -> Result<usize> {
    let Some(last) = points.last() else {
        return Err(TcxFixError::IntegrityViolation {
            lap: lap_no,
            reason: "lap has no trackpoints".to_string(),
        });
    };
    let end = last.distance_meters;

    let moving = points
        .iter()
        .rposition(|p| p.distance_meters != end)
        .ok_or_else(|| TcxFixError::IntegrityViolation {
            lap: lap_no,
            reason: format!("every trackpoint is at {end} m, the lap has no distance-bearing sample"),
        })?;
    let kept = moving + 2;

    if points[kept - 1].distance_meters != end {
        return Err(TcxFixError::IntegrityViolation {
            lap: lap_no,
            reason: format!("trimming lost the terminal distance {end} m"),
        });
    }

    Ok(kept)
}

/// Lap duration from the first to the last kept point, cross-checked against
/// `TotalTimeSeconds`. One more trailing point is dropped if the two disagree.
fn measure_duration(
    lap_no: usize,
    lap: &TcxLap,
    mut kept: usize,
    policy: DurationPolicy,
) -> Result<(usize, f64)> {
    let recorded = lap.total_time_seconds;
    let span = |kept: usize| seconds(lap.points[kept - 1].time - lap.points[0].time);

    if policy == DurationPolicy::TrustRecorded {
        return Ok((kept, recorded));
    }

    let mut adj_len = span(kept);
    if (adj_len - recorded).abs() > DURATION_TOLERANCE_SECS && kept > 1 {
        // the last kept sample may itself be an artifact
        kept -= 1;
        adj_len = span(kept);
    }
    if (adj_len - recorded).abs() > DURATION_TOLERANCE_SECS {
        return Err(TcxFixError::DurationMismatch {
            lap: lap_no,
            adj_len,
            recorded,
        });
    }

    Ok((kept, adj_len))
}

/// Map the first `kept` points into the corrected lap's distance range and
/// apply the lap's retiming.
///
/// Distances scale linearly between the lap's first point and its terminal
/// point as recorded before trimming.
fn rescale_points(
    lap_no: usize,
    lap: &TcxLap,
    kept: usize,
    target: f64,
    meters_before: f64,
    retime: Retime,
) -> Result<Vec<CorrectedPoint>> {
    let start = lap.points[0].distance_meters;
    let end = lap.points[lap.points.len() - 1].distance_meters;
    let span = end - start;
    if span <= 0.0 {
        return Err(TcxFixError::IntegrityViolation {
            lap: lap_no,
            reason: format!("recorded distance runs from {start} m to {end} m"),
        });
    }

    lap.points[..kept]
        .iter()
        .enumerate()
        .map(|(ordinal, p)| {
            let fraction = (p.distance_meters - start) / span;
            let time = retime
                .apply(p.time, ordinal)
                .ok_or_else(|| TcxFixError::InvalidValue {
                    element: "Time",
                    value: p.time.to_rfc3339(),
                })?;
            Ok(CorrectedPoint {
                time,
                distance_meters: fraction * target + meters_before,
            })
        })
        .collect()
}

fn seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

fn seconds_delta(secs: f64) -> Option<TimeDelta> {
    let millis = (secs * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64)
}
