use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::TcxFixError;
use crate::tcx_types::*;

type Result<T> = std::result::Result<T, TcxFixError>;

/// Parse a TCX XML string into a TcxDocument.
///
/// Elements are matched by local name, so both the default Garmin namespace
/// and prefixed forms are accepted.
pub fn parse_tcx(xml: &str) -> Result<TcxDocument> {
    let mut reader = Reader::from_str(xml);
    let mut doc = TcxDocument::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Activity" => doc.activities.push(parse_activity(&e, &mut reader)?),
                b"Author" | b"Courses" | b"Workouts" | b"Folders" | b"Extensions" => {
                    reader
                        .read_to_end(e.name())
                        .map_err(TcxFixError::XmlParse)?;
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Activity" {
                    doc.activities.push(TcxActivity {
                        sport: find_attribute(&e, b"Sport")?,
                        ..Default::default()
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TcxFixError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(doc)
}

/// Parse an <Activity> element.
fn parse_activity<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<TcxActivity> {
    let mut activity = TcxActivity {
        sport: find_attribute(start, b"Sport")?,
        ..Default::default()
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Id" => activity.id = Some(read_text_owned(reader, &e)?),
                b"Lap" => activity.laps.push(parse_lap(&e, reader)?),
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(TcxFixError::XmlParse)?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Activity" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TcxFixError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(activity)
}

/// Parse a <Lap> element, collecting the trackpoints of all its tracks.
fn parse_lap<'a>(start: &BytesStart<'a>, reader: &mut Reader<&'a [u8]>) -> Result<TcxLap> {
    let start_time = find_attribute(start, b"StartTime")?.ok_or(TcxFixError::MissingElement {
        parent: "Lap",
        element: "StartTime",
    })?;
    let start_time = parse_time(&start_time, "Lap StartTime")?;

    let mut total_time_seconds: Option<f64> = None;
    let mut distance_meters: Option<f64> = None;
    let mut points = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"TotalTimeSeconds" => {
                    let text = read_text_owned(reader, &e)?;
                    total_time_seconds = Some(parse_number(&text, "TotalTimeSeconds")?);
                }
                b"DistanceMeters" => {
                    let text = read_text_owned(reader, &e)?;
                    distance_meters = Some(parse_number(&text, "DistanceMeters")?);
                }
                b"Track" => parse_track(reader, &mut points)?,
                _ => {
                    // Skip Calories, HeartRate, Extensions, ...
                    reader
                        .read_to_end(e.name())
                        .map_err(TcxFixError::XmlParse)?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Lap" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TcxFixError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(TcxLap {
        start_time,
        total_time_seconds: total_time_seconds.ok_or(TcxFixError::MissingElement {
            parent: "Lap",
            element: "TotalTimeSeconds",
        })?,
        distance_meters: distance_meters.ok_or(TcxFixError::MissingElement {
            parent: "Lap",
            element: "DistanceMeters",
        })?,
        points,
    })
}

/// Parse a <Track> element, appending its trackpoints to `points`.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>, points: &mut Vec<Trackpoint>) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Trackpoint" => points.push(parse_trackpoint(reader)?),
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(TcxFixError::XmlParse)?;
                }
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"Trackpoint" => {
                return Err(TcxFixError::MissingElement {
                    parent: "Trackpoint",
                    element: "Time",
                });
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Track" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TcxFixError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(())
}

/// Parse a <Trackpoint> element. Position, heart rate and extensions are
/// left to the writer, which passes them through untouched.
fn parse_trackpoint<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Trackpoint> {
    let mut time: Option<DateTime<Utc>> = None;
    let mut distance_meters: Option<f64> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Time" => {
                    let text = read_text_owned(reader, &e)?;
                    time = Some(parse_time(&text, "Time")?);
                }
                b"DistanceMeters" => {
                    let text = read_text_owned(reader, &e)?;
                    distance_meters = Some(parse_number(&text, "DistanceMeters")?);
                }
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(TcxFixError::XmlParse)?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"Trackpoint" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TcxFixError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(Trackpoint {
        time: time.ok_or(TcxFixError::MissingElement {
            parent: "Trackpoint",
            element: "Time",
        })?,
        distance_meters: distance_meters.ok_or(TcxFixError::MissingElement {
            parent: "Trackpoint",
            element: "DistanceMeters",
        })?,
    })
}

/// Value of the attribute with local name `key`, if present.
pub(crate) fn find_attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| TcxFixError::XmlParse(e.into()))?;
        if attr.key.local_name().as_ref() == key {
            let val = std::str::from_utf8(&attr.value).unwrap_or_default();
            return Ok(Some(val.to_string()));
        }
    }
    Ok(None)
}

/// Parse a TCX timestamp (`2024-05-01T10:00:00.000Z`, milliseconds optional).
pub(crate) fn parse_time(text: &str, element: &'static str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TcxFixError::InvalidValue {
            element,
            value: text.to_string(),
        })
}

fn parse_number(text: &str, element: &'static str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TcxFixError::InvalidValue {
            element,
            value: text.to_string(),
        })
}

/// Read the text content of an element as an owned, trimmed String.
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(raw);
            }
            Ok(Event::CData(e)) => {
                let s = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(s);
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TcxFixError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(text.trim().to_string())
}
