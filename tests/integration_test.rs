use tcx_lapfix::error::TcxFixError;
use tcx_lapfix::options::{CorrectionOptions, DurationPolicy, PausePolicy, TargetMode};
use tcx_lapfix::parser::parse_tcx;
use tcx_lapfix::tcx_types::TcxDocument;
use tcx_lapfix::{FixOutcome, fix_tcx, lap_template};

use chrono::{DateTime, TimeDelta, Utc};

fn load_fixture(path: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{path}")).unwrap()
}

fn fix(tcx: &str, laps: &str) -> FixOutcome {
    fix_tcx(tcx, laps, &CorrectionOptions::default()).unwrap()
}

fn reparse(outcome: &FixOutcome) -> TcxDocument {
    parse_tcx(&outcome.tcx).unwrap()
}

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + TimeDelta::seconds(secs)
}

// ---- distance mode ----

#[test]
fn test_three_lap_scenario() {
    let outcome = fix(
        &load_fixture("three_laps.tcx"),
        &load_fixture("three_laps.txt"),
    );
    let doc = reparse(&outcome);
    let laps = &doc.activities[0].laps;
    assert_eq!(laps.len(), 3);

    let expected = [1770.27, 1448.41, 1609.34];
    for (lap, want) in laps.iter().zip(expected) {
        assert!((lap.distance_meters - want).abs() < 0.01);
    }
    assert!((outcome.summary.total_meters - 4828.02).abs() < 0.01);
    assert!((outcome.summary.total_miles - 3.0).abs() < 1e-9);
    assert!(outcome.tcx.contains("<DistanceMeters>1770.27</DistanceMeters>"));
}

#[test]
fn test_conservation() {
    let outcome = fix(
        &load_fixture("three_laps.tcx"),
        &load_fixture("three_laps.txt"),
    );
    let sum = outcome
        .summary
        .laps
        .iter()
        .fold(0.0, |acc, lap| acc + lap.corrected_meters);
    assert_eq!(sum, outcome.summary.total_meters);
}

#[test]
fn test_artifact_points_trimmed() {
    let outcome = fix(
        &load_fixture("three_laps.tcx"),
        &load_fixture("three_laps.txt"),
    );
    let doc = reparse(&outcome);
    let laps = &doc.activities[0].laps;

    assert_eq!(laps[0].points.len(), 61);
    assert_eq!(laps[1].points.len(), 61);
    assert_eq!(outcome.summary.laps[0].trimmed_points, 2);

    // the surviving endpoint carries the full corrected lap distance
    let last = laps[0].points.last().unwrap();
    assert!((last.distance_meters - 1.1 * 1609.34).abs() < 1e-6);
    assert!(!outcome.tcx.contains("10:10:05"));
}

#[test]
fn test_monotonic_across_laps() {
    let outcome = fix(
        &load_fixture("three_laps.tcx"),
        &load_fixture("three_laps.txt"),
    );
    let doc = reparse(&outcome);
    let points: Vec<_> = doc.activities[0]
        .laps
        .iter()
        .flat_map(|lap| lap.points.iter())
        .collect();

    assert!(points
        .windows(2)
        .all(|w| w[0].distance_meters <= w[1].distance_meters));
    assert!(points.windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn test_inter_lap_pause_closed() {
    let outcome = fix(
        &load_fixture("three_laps.tcx"),
        &load_fixture("three_laps.txt"),
    );
    let doc = reparse(&outcome);
    let laps = &doc.activities[0].laps;

    let lap2_end = laps[1].points.last().unwrap().time;
    assert_eq!(lap2_end, at(1200));
    assert_eq!(laps[2].start_time, lap2_end);
    assert_eq!(laps[2].points[0].time, at(1200));
    assert_eq!(laps[2].points.last().unwrap().time, at(1800));

    assert!((outcome.summary.total_seconds - 1800.0).abs() < 1e-9);
    assert!((outcome.summary.original_total_seconds - 1830.0).abs() < 1e-9);
}

#[test]
fn test_status_quo_roundtrip() {
    let tcx = load_fixture("steady.tcx");
    let laps = format!("{}\n", 1609.0 / 1609.34).repeat(3);
    let outcome = fix(&tcx, &laps);

    let before = parse_tcx(&tcx).unwrap();
    let after = reparse(&outcome);
    for (a, b) in before.activities[0].laps.iter().zip(&after.activities[0].laps) {
        assert!((a.distance_meters - b.distance_meters).abs() < 1e-6);
        assert_eq!(a.start_time, b.start_time);
        assert_eq!(a.points.len(), b.points.len());
        for (p, q) in a.points.iter().zip(&b.points) {
            assert!((p.distance_meters - q.distance_meters).abs() < 1e-6);
            assert_eq!(p.time, q.time);
        }
    }
}

#[test]
fn test_untouched_fields_preserved() {
    let outcome = fix(
        &load_fixture("three_laps.tcx"),
        &load_fixture("three_laps.txt"),
    );
    assert!(outcome
        .tcx
        .starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(outcome.tcx.contains(r#"<Activity Sport="Running">"#));
    assert!(outcome.tcx.contains("<TotalTimeSeconds>600.0</TotalTimeSeconds>"));
    assert!(outcome.tcx.contains("<ns3:Speed>2.68</ns3:Speed>"));
    assert!(outcome.tcx.contains("<Name>Forerunner 255</Name>"));
    assert!(outcome.tcx.contains("<LatitudeDegrees>47.37002682</LatitudeDegrees>"));
}

// ---- failures ----

#[test]
fn test_lap_count_mismatch() {
    let err = fix_tcx(
        &load_fixture("three_laps.tcx"),
        "1.0\n1.0\n",
        &CorrectionOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TcxFixError::StructuralMismatch(_)));
}

#[test]
fn test_bad_laps_file() {
    let err = fix_tcx(
        &load_fixture("three_laps.tcx"),
        "1.0\none\n1.0\n",
        &CorrectionOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, TcxFixError::Format { line: 2, .. }));
}

#[test]
fn test_recorded_duration_disagrees() {
    let tcx = load_fixture("three_laps.tcx").replacen(
        "<TotalTimeSeconds>600.0</TotalTimeSeconds>",
        "<TotalTimeSeconds>640.0</TotalTimeSeconds>",
        1,
    );
    let laps = load_fixture("three_laps.txt");

    let err = fix_tcx(&tcx, &laps, &CorrectionOptions::default()).unwrap_err();
    match &err {
        TcxFixError::DurationMismatch { lap, recorded, .. } => {
            assert_eq!(*lap, 1);
            assert!((recorded - 640.0).abs() < 1e-9);
        }
        other => panic!("Expected DurationMismatch, got {other:?}"),
    }
    assert!(err.to_string().contains("--use-recorded-time"));

    let opts = CorrectionOptions {
        duration: DurationPolicy::TrustRecorded,
        ..Default::default()
    };
    let outcome = fix_tcx(&tcx, &laps, &opts).unwrap();
    assert!((outcome.summary.laps[0].seconds - 640.0).abs() < 1e-9);
}

#[test]
fn test_two_activities_rejected() {
    let tcx = load_fixture("steady.tcx");
    let start = tcx.find("<Activity ").unwrap();
    let end = tcx.find("</Activity>").unwrap() + "</Activity>".len();
    let doubled = format!("{}\n    {}", &tcx[..end], &tcx[start..]);

    let err = fix_tcx(&doubled, "1\n1\n1\n", &CorrectionOptions::default()).unwrap_err();
    assert!(matches!(err, TcxFixError::StructuralMismatch(_)));
}

// ---- treadmill ----

fn treadmill_opts() -> CorrectionOptions {
    CorrectionOptions {
        duration: DurationPolicy::TrustRecorded,
        pause: PausePolicy::MidLap,
        target: TargetMode::Pace,
    }
}

#[test]
fn test_treadmill_paces() {
    let outcome = fix_tcx(
        &load_fixture("treadmill.tcx"),
        &load_fixture("treadmill_paces.txt"),
        &treadmill_opts(),
    )
    .unwrap();
    let doc = reparse(&outcome);
    let laps = &doc.activities[0].laps;

    // 600 s at 10:00/mi and 570 s at 9:30/mi are both one mile
    assert!((laps[0].distance_meters - 1609.34).abs() < 1e-9);
    assert!((laps[1].distance_meters - 1609.34).abs() < 1e-9);
    assert_eq!(outcome.summary.laps[0].split, "10:00/mi");
    assert_eq!(outcome.summary.laps[1].split, "9:30/mi");
}

#[test]
fn test_treadmill_points_one_second_apart() {
    let outcome = fix_tcx(
        &load_fixture("treadmill.tcx"),
        &load_fixture("treadmill_paces.txt"),
        &treadmill_opts(),
    )
    .unwrap();
    let doc = reparse(&outcome);
    let laps = &doc.activities[0].laps;

    for (i, p) in laps[0].points.iter().enumerate() {
        assert_eq!(p.time, at(i as i64));
    }
    // lap 2 continues from lap 1's start plus its recorded duration
    for (i, p) in laps[1].points.iter().enumerate() {
        assert_eq!(p.time, at(600 + i as i64));
    }
    // lap start attributes are left as recorded
    assert_eq!(laps[0].start_time, at(0));
    assert_eq!(laps[1].start_time, at(700));
}

#[test]
fn test_treadmill_needs_recorded_time() {
    let opts = CorrectionOptions {
        duration: DurationPolicy::Verify,
        ..treadmill_opts()
    };
    let err = fix_tcx(
        &load_fixture("treadmill.tcx"),
        &load_fixture("treadmill_paces.txt"),
        &opts,
    )
    .unwrap_err();
    assert!(matches!(err, TcxFixError::DurationMismatch { lap: 1, .. }));
}

// ---- laps template ----

#[test]
fn test_lap_template() {
    let template = lap_template(&load_fixture("steady.tcx")).unwrap();
    assert_eq!(template, "1.000\n1.000\n1.000\n");

    let treadmill = lap_template(&load_fixture("treadmill.tcx")).unwrap();
    assert_eq!(treadmill, "0.994\n0.870\n");
}
