// GeoTag - Library Entry Point
//
// Assign locations to photos from GPX track logs or by interpolation, then
// write them back through ExifTool with optional backups and sidecars.

pub mod backup;
pub mod constants;
pub mod coords;
pub mod error;
pub mod geodesy;
pub mod gpx;
pub mod hash;
pub mod image;
pub mod interpolate;
pub mod locate;
pub mod metadata;
pub mod retime;
pub mod sandbox;
pub mod save;
pub mod settings;
pub mod tools;

pub use coords::{CoordFormat, Coordinate};
pub use error::{GeoTagError, Result};
pub use gpx::{load_track_logs, TrackLog};
pub use image::{ImageRecord, LocationChange, TimestampChange};
pub use interpolate::interpolate;
pub use locate::{locate_from_tracks, LocateOptions};
pub use metadata::{ExifToolWriter, MetadataWriter};
pub use retime::{adjust_timestamps, TimeAdjustment};
pub use save::{save_images, SaveIssues, SaveOptions, SaveProgress};
pub use settings::Settings;
