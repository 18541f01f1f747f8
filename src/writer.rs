use std::borrow::Cow;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::TcxFixError;
use crate::reconciler::{CorrectedLap, CorrectedPoint, Correction};
use crate::summary::round2;

type Result<T> = std::result::Result<T, TcxFixError>;

/// Where we are inside the single activity while streaming.
#[derive(Default)]
struct Cursor {
    lap: Option<usize>,
    laps_seen: usize,
    point: Option<usize>,
    points_seen: usize,
}

/// Re-stream `xml`, writing the corrected lap and trackpoint values.
///
/// Only lap `StartTime`, lap and trackpoint `DistanceMeters`, and trackpoint
/// `Time` change; trackpoints trimmed during correction are dropped along with
/// the indentation in front of them. All other bytes pass through as read.
pub fn write_corrected(xml: &str, correction: &Correction) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut cursor = Cursor::default();
    let mut pending_ws: Option<Event<'_>> = None;

    loop {
        let event = reader.read_event().map_err(TcxFixError::XmlParse)?;

        let is_ws =
            matches!(&event, Event::Text(t) if t.as_ref().iter().all(u8::is_ascii_whitespace));
        if is_ws {
            if let Some(ws) = pending_ws.replace(event) {
                write(&mut writer, ws)?;
            }
            continue;
        }

        match event {
            Event::Start(e) => {
                let parent = stack.last().map(Vec::as_slice);
                let local = e.local_name().as_ref().to_vec();

                match (local.as_slice(), parent) {
                    (b"Lap", Some(b"Activity")) => {
                        let lap = lap_at(correction, cursor.laps_seen)?;
                        cursor.lap = Some(cursor.laps_seen);
                        cursor.laps_seen += 1;
                        cursor.points_seen = 0;
                        flush(&mut writer, &mut pending_ws)?;
                        match lap.start_time {
                            Some(start) => {
                                write(&mut writer, Event::Start(with_start_time(&e, start)?))?
                            }
                            None => write(&mut writer, Event::Start(e))?,
                        }
                    }
                    (b"Trackpoint", Some(b"Track")) if cursor.lap.is_some() => {
                        let index = cursor.points_seen;
                        cursor.points_seen += 1;
                        if current_point(correction, &cursor, index).is_none() {
                            // trimmed: drop the element and its indentation
                            pending_ws = None;
                            reader
                                .read_to_end(e.name())
                                .map_err(TcxFixError::XmlParse)?;
                            continue;
                        }
                        cursor.point = Some(index);
                        flush(&mut writer, &mut pending_ws)?;
                        write(&mut writer, Event::Start(e))?;
                    }
                    (b"DistanceMeters", Some(b"Lap")) if cursor.lap.is_some() => {
                        let lap = lap_at(correction, cursor.lap.unwrap_or_default())?;
                        flush(&mut writer, &mut pending_ws)?;
                        let text = format_meters(round2(lap.distance_meters));
                        replace_text(&mut reader, &mut writer, e, &text)?;
                        continue;
                    }
                    (b"DistanceMeters" | b"Time", Some(b"Trackpoint")) if cursor.point.is_some() => {
                        let point = cursor
                            .point
                            .and_then(|index| current_point(correction, &cursor, index))
                            .ok_or_else(|| {
                                TcxFixError::Write("trackpoint out of range".to_string())
                            })?;
                        let text = if local.as_slice() == b"Time" {
                            format_time(point.time)
                        } else {
                            format_meters(point.distance_meters)
                        };
                        flush(&mut writer, &mut pending_ws)?;
                        replace_text(&mut reader, &mut writer, e, &text)?;
                        continue;
                    }
                    _ => {
                        flush(&mut writer, &mut pending_ws)?;
                        write(&mut writer, Event::Start(e))?;
                    }
                }
                stack.push(local);
            }
            Event::End(e) => {
                match stack.pop().as_deref() {
                    Some(b"Lap") if parent_is(&stack, b"Activity") => {
                        cursor.lap = None;
                    }
                    Some(b"Trackpoint") => cursor.point = None,
                    _ => {}
                }
                flush(&mut writer, &mut pending_ws)?;
                write(&mut writer, Event::End(e))?;
            }
            Event::Eof => {
                flush(&mut writer, &mut pending_ws)?;
                break;
            }
            other => {
                flush(&mut writer, &mut pending_ws)?;
                write(&mut writer, other)?;
            }
        }
    }

    if cursor.laps_seen != correction.laps.len() {
        return Err(TcxFixError::StructuralMismatch(format!(
            "document has {} laps, correction has {}",
            cursor.laps_seen,
            correction.laps.len()
        )));
    }

    String::from_utf8(writer.into_inner()).map_err(|e| TcxFixError::Write(e.to_string()))
}

fn parent_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().is_some_and(|p| p.as_slice() == name)
}

fn lap_at(correction: &Correction, index: usize) -> Result<&CorrectedLap> {
    correction.laps.get(index).ok_or_else(|| {
        TcxFixError::StructuralMismatch(format!(
            "document has more laps than the {} corrected",
            correction.laps.len()
        ))
    })
}

fn current_point<'c>(
    correction: &'c Correction,
    cursor: &Cursor,
    index: usize,
) -> Option<&'c CorrectedPoint> {
    cursor
        .lap
        .and_then(|lap| correction.laps.get(lap))
        .and_then(|lap| lap.points.get(index))
}

/// Copy of a <Lap> start tag with its `StartTime` replaced.
fn with_start_time(e: &BytesStart<'_>, start: DateTime<Utc>) -> Result<BytesStart<'static>> {
    let mut lap = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| TcxFixError::XmlParse(e.into()))?;
        if attr.key.local_name().as_ref() == b"StartTime" {
            lap.push_attribute(Attribute {
                key: attr.key,
                value: Cow::Owned(format_time(start).into_bytes()),
            });
        } else {
            lap.push_attribute(attr);
        }
    }
    Ok(lap)
}

/// Write `start`, then `text` in place of the element's content, then its end tag.
fn replace_text<'a>(
    reader: &mut Reader<&'a [u8]>,
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'a>,
    text: &str,
) -> Result<()> {
    let end_name = start.name().0.to_vec();
    write(writer, Event::Start(start))?;
    loop {
        match reader.read_event().map_err(TcxFixError::XmlParse)? {
            Event::End(e) if e.name().0 == end_name.as_slice() => {
                write(writer, Event::Text(BytesText::new(text)))?;
                write(writer, Event::End(e))?;
                return Ok(());
            }
            Event::Eof => {
                return Err(TcxFixError::Write(format!(
                    "unexpected end of document inside <{}>",
                    String::from_utf8_lossy(&end_name)
                )));
            }
            _ => {}
        }
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| TcxFixError::Write(e.to_string()))
}

fn flush(writer: &mut Writer<Vec<u8>>, pending: &mut Option<Event<'_>>) -> Result<()> {
    match pending.take() {
        Some(ws) => write(writer, ws),
        None => Ok(()),
    }
}

/// TCX timestamp with milliseconds and a literal `Z`.
pub fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Shortest decimal form of a distance, always with a fractional part.
pub fn format_meters(meters: f64) -> String {
    let s = meters.to_string();
    if s.contains('.') || !meters.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}

/// Output path next to the input: `run.tcx` becomes `run-fixed.tcx`.
pub fn fixed_output_path(input: &Path) -> PathBuf {
    let s = input.to_string_lossy();
    let stem = s
        .strip_suffix(".tcx")
        .or_else(|| s.strip_suffix(".TCX"))
        .unwrap_or(&s);
    PathBuf::from(format!("{stem}-fixed.tcx"))
}
