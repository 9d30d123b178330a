// Coordinates and their textual forms

pub mod codec;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{LATITUDE_REFS, LONGITUDE_REFS};

pub use codec::{format_coord, parse_coord, parse_latitude, parse_longitude};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordFormatError {
    #[error("too many parts in coordinate")]
    TooManyParts,

    #[error("empty coordinate")]
    Empty,

    #[error("not a number: {0}")]
    NotANumber(String),

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("negative coordinate used with a {0} reference")]
    NegativeWithReference(String),
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Returns the coordinate only if both parts are within world bounds.
    /// Metadata from damaged files can carry anything.
    pub fn validated(latitude: f64, longitude: f64) -> Option<Self> {
        let coord = Self::new(latitude, longitude);
        coord.is_valid().then_some(coord)
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }

    pub fn formatted_latitude(&self, style: CoordFormat) -> String {
        format_coord(Some(self.latitude), style, &LATITUDE_REFS)
    }

    pub fn formatted_longitude(&self, style: CoordFormat) -> String {
        format_coord(Some(self.longitude), style, &LONGITUDE_REFS)
    }
}

/// Display styles for a single coordinate value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordFormat {
    /// Signed decimal degrees
    #[default]
    Decimal,
    /// Degrees and decimal minutes with a reference letter
    DegMin,
    /// Degrees, minutes and decimal seconds with a reference letter
    DegMinSec,
}

impl std::str::FromStr for CoordFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deg" | "decimal" => Ok(CoordFormat::Decimal),
            "degmin" | "dm" => Ok(CoordFormat::DegMin),
            "degminsec" | "dms" => Ok(CoordFormat::DegMinSec),
            other => Err(format!("unknown coordinate format: {}", other)),
        }
    }
}
