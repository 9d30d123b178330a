// GPX streaming parser
//
// Driven by quick-xml events. Element names are compared by local name so
// namespace prefixes don't matter. A self-closing element is handled as a
// start immediately followed by an end.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{GpxError, Segment, Track, TrackLog, TrackPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    None,
    Track,
    Segment,
    Point,
    Elevation,
    Time,
    Error,
}

#[derive(Debug)]
struct TrackLogBuilder {
    state: ParseState,
    log: TrackLog,
    elevation_text: String,
    reason: String,
}

impl Default for TrackLogBuilder {
    fn default() -> Self {
        Self {
            state: ParseState::None,
            log: TrackLog::default(),
            elevation_text: String::new(),
            reason: String::new(),
        }
    }
}

impl TrackLogBuilder {
    fn fail(&mut self, reason: impl Into<String>) {
        self.state = ParseState::Error;
        self.reason = reason.into();
    }

    fn current_point_mut(&mut self) -> Option<&mut TrackPoint> {
        self.log
            .tracks
            .last_mut()
            .and_then(|t| t.segments.last_mut())
            .and_then(|s| s.points.last_mut())
    }

    fn start(&mut self, element: &BytesStart) {
        if self.state == ParseState::Error {
            return;
        }

        match element.local_name().as_ref() {
            b"trk" => {
                if self.state == ParseState::None {
                    self.log.tracks.push(Track::default());
                    self.state = ParseState::Track;
                } else {
                    self.fail("<trk> is not allowed here");
                }
            }
            b"trkseg" => {
                if self.state != ParseState::Track {
                    self.fail("<trkseg> outside of <trk>");
                    return;
                }
                if let Some(track) = self.log.tracks.last_mut() {
                    track.segments.push(Segment::default());
                }
                self.state = ParseState::Segment;
            }
            b"trkpt" => {
                if self.state != ParseState::Segment {
                    self.fail("<trkpt> outside of <trkseg>");
                    return;
                }
                let Some(point) = point_from_attributes(element) else {
                    self.fail("<trkpt> missing a valid lat or lon");
                    return;
                };
                if let Some(segment) = self
                    .log
                    .tracks
                    .last_mut()
                    .and_then(|t| t.segments.last_mut())
                {
                    segment.points.push(point);
                }
                self.state = ParseState::Point;
            }
            b"ele" if self.state == ParseState::Point => {
                self.elevation_text.clear();
                self.state = ParseState::Elevation;
            }
            b"time" if self.state == ParseState::Point => {
                self.state = ParseState::Time;
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        if self.state == ParseState::Error {
            return;
        }

        match name {
            b"ele" => {
                if self.state == ParseState::Elevation {
                    let elevation = self.elevation_text.trim().parse::<f64>().ok();
                    if let Some(point) = self.current_point_mut() {
                        point.elevation = elevation;
                    }
                    self.state = ParseState::Point;
                }
            }
            b"time" => {
                if self.state == ParseState::Time {
                    self.state = ParseState::Point;
                }
            }
            b"trkpt" => self.close(ParseState::Point, ParseState::Segment, "</trkpt>"),
            b"trkseg" => self.close(ParseState::Segment, ParseState::Track, "</trkseg>"),
            b"trk" => self.close(ParseState::Track, ParseState::None, "</trk>"),
            _ => {}
        }
    }

    fn close(&mut self, expected: ParseState, next: ParseState, tag: &str) {
        if self.state == expected {
            self.state = next;
        } else {
            self.fail(format!("unexpected {}", tag));
        }
    }

    fn wants_text(&self) -> bool {
        matches!(self.state, ParseState::Elevation | ParseState::Time)
    }

    fn characters(&mut self, text: &str) {
        match self.state {
            ParseState::Elevation => {
                if self.current_point_mut().is_some() {
                    self.elevation_text.push_str(text);
                } else {
                    self.fail("elevation without a track point");
                }
            }
            ParseState::Time => match self.current_point_mut() {
                Some(point) => point.push_time_text(text),
                None => self.fail("time without a track point"),
            },
            _ => {}
        }
    }

    fn finish(self) -> Result<TrackLog, GpxError> {
        match self.state {
            ParseState::None => {}
            ParseState::Error => return Err(GpxError::MalformedDocument(self.reason)),
            _ => {
                return Err(GpxError::MalformedDocument(
                    "document ended inside a track".to_string(),
                ))
            }
        }
        if self.log.point_count() == 0 {
            return Err(GpxError::NoPoints);
        }
        Ok(self.log)
    }
}

fn point_from_attributes(element: &BytesStart) -> Option<TrackPoint> {
    let mut latitude = None;
    let mut longitude = None;

    for attr in element.attributes() {
        let attr = attr.ok()?;
        let value = attr.unescape_value().ok()?;
        match attr.key.local_name().as_ref() {
            b"lat" => latitude = value.trim().parse::<f64>().ok(),
            b"lon" => longitude = value.trim().parse::<f64>().ok(),
            _ => {}
        }
    }

    Some(TrackPoint::new(latitude?, longitude?))
}

/// Build a `TrackLog` from a GPX byte stream.
pub(crate) fn parse<R: BufRead>(source: R) -> Result<TrackLog, GpxError> {
    let mut reader = Reader::from_reader(source);
    let mut builder = TrackLogBuilder::default();
    let mut buf = Vec::new();

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(quick_xml::Error::Io(e)) => return Err(GpxError::OpenFailed(e.to_string())),
            Err(e) => {
                return Err(GpxError::MalformedDocument(format!(
                    "{} at byte {}",
                    e,
                    reader.buffer_position()
                )))
            }
        };

        match event {
            Event::Start(ref e) => builder.start(e),
            Event::Empty(ref e) => {
                builder.start(e);
                builder.end(e.local_name().as_ref());
            }
            Event::End(ref e) => builder.end(e.local_name().as_ref()),
            Event::Text(ref e) if builder.wants_text() => {
                let text = e
                    .unescape()
                    .map_err(|err| GpxError::MalformedDocument(err.to_string()))?;
                builder.characters(&text);
            }
            Event::CData(ref e) if builder.wants_text() => {
                builder.characters(&String::from_utf8_lossy(e));
            }
            Event::Eof => break,
            _ => {}
        }

        if builder.state == ParseState::Error {
            break;
        }
        buf.clear();
    }

    builder.finish()
}
