// GPX track logs
//
// A log holds tracks, a track holds segments, a segment holds points.
// Only trk/trkseg/trkpt/ele/time are read; everything else in the document
// is skipped.

pub mod parser;
pub mod search;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, OnceLock};
use std::thread;

use chrono::DateTime;
use regex::Regex;
use thiserror::Error;

pub use search::{search, search_logs, TrackMatch};

#[derive(Error, Debug)]
pub enum GpxError {
    #[error("could not open GPX file: {0}")]
    OpenFailed(String),

    #[error("malformed GPX document: {0}")]
    MalformedDocument(String),

    #[error("GPX file contains no track points")]
    NoPoints,
}

static FRACTIONAL_SECONDS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\.\d+").ok());

/// A single recorded position.
///
/// `time` is kept exactly as it appeared in the document. Its epoch value
/// is computed on first use.
#[derive(Debug, Clone, Default)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub time: String,
    epoch: OnceLock<i64>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = time.into();
        self.epoch = OnceLock::new();
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// Seconds since the Unix epoch, 0 when the time text can't be parsed.
    /// Sub-second precision is dropped.
    pub fn epoch(&self) -> i64 {
        *self.epoch.get_or_init(|| parse_point_time(&self.time))
    }

    pub(crate) fn push_time_text(&mut self, text: &str) {
        self.time.push_str(text);
        self.epoch = OnceLock::new();
    }
}

impl PartialEq for TrackPoint {
    fn eq(&self, other: &Self) -> bool {
        self.latitude == other.latitude
            && self.longitude == other.longitude
            && self.elevation == other.elevation
            && self.time == other.time
    }
}

fn parse_point_time(text: &str) -> i64 {
    let Some(fraction) = FRACTIONAL_SECONDS.as_ref() else {
        return 0;
    };
    let whole_seconds = fraction.replace_all(text.trim(), "");
    DateTime::parse_from_rfc3339(&whole_seconds)
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub points: Vec<TrackPoint>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackLog {
    pub tracks: Vec<Track>,
}

impl TrackLog {
    pub fn from_path(path: &Path) -> Result<Self, GpxError> {
        let file = File::open(path)
            .map_err(|e| GpxError::OpenFailed(format!("{}: {}", path.display(), e)))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, GpxError> {
        parser::parse(reader)
    }

    pub fn parse_str(text: &str) -> Result<Self, GpxError> {
        Self::from_reader(text.as_bytes())
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn segment_count(&self) -> usize {
        self.tracks.iter().map(|t| t.segments.len()).sum()
    }

    pub fn point_count(&self) -> usize {
        self.points().count()
    }

    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .flat_map(|s| s.points.iter())
    }

    /// Earliest and latest point times, ignoring points whose time
    /// could not be read.
    pub fn time_span(&self) -> Option<(i64, i64)> {
        self.points()
            .map(TrackPoint::epoch)
            .filter(|&t| t != 0)
            .fold(None, |span, t| match span {
                None => Some((t, t)),
                Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
            })
    }
}

/// Outcome of loading several GPX files at once.
#[derive(Debug, Default)]
pub struct TrackLoadReport {
    pub logs: Vec<(PathBuf, TrackLog)>,
    pub failed: Vec<(PathBuf, GpxError)>,
}

impl TrackLoadReport {
    pub fn loaded_paths(&self) -> Vec<&Path> {
        self.logs.iter().map(|(p, _)| p.as_path()).collect()
    }

    pub fn track_logs(&self) -> Vec<&TrackLog> {
        self.logs.iter().map(|(_, log)| log).collect()
    }
}

/// Parse each file on its own thread. Results keep the input order.
pub fn load_track_logs(paths: &[PathBuf]) -> TrackLoadReport {
    let results: Vec<(PathBuf, Result<TrackLog, GpxError>)> = thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| (path, scope.spawn(move || TrackLog::from_path(path))))
            .collect();

        handles
            .into_iter()
            .map(|(path, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(GpxError::MalformedDocument("parser panicked".to_string()))
                });
                (path.clone(), result)
            })
            .collect()
    });

    let mut report = TrackLoadReport::default();
    for (path, result) in results {
        match result {
            Ok(log) => {
                log::info!(
                    "Loaded {} ({} tracks, {} points)",
                    path.display(),
                    log.track_count(),
                    log.point_count()
                );
                report.logs.push((path, log));
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}", path.display(), e);
                report.failed.push((path, e));
            }
        }
    }
    report
}
