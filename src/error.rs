// GeoTag Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoTagError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GPX error: {0}")]
    Gpx(#[from] crate::gpx::GpxError),

    #[error("Coordinate error: {0}")]
    Coord(#[from] crate::coords::CoordFormatError),

    #[error("Interpolation error: {0}")]
    Interpolate(#[from] crate::interpolate::InterpolateError),

    #[error("ExifTool error: {0}")]
    ExifTool(String),

    #[error("Backup error: {0}")]
    Backup(String),

    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("A backup folder must be selected before images can be saved")]
    NoBackupFolder,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GeoTagError>;
