// Image records
//
// An image is identified by its file path. Current values are what the user
// (or a track log) assigned; original values are what the file held when it
// was loaded or last saved.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::constants::{GPS_TIMESTAMP_FORMAT, IMAGE_DATE_FORMAT, XMP_EXTENSION};
use crate::coords::Coordinate;
use crate::error::{GeoTagError, Result};
use crate::metadata::{exiftool, has_image_extension, ImageMetadata};
use crate::sandbox::SidecarPresenter;

/// Location and elevation as a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPosition {
    pub location: Option<Coordinate>,
    pub elevation: Option<f64>,
}

/// One image's location before and after an assignment. A batch of these
/// is a single undo step for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationChange {
    pub id: PathBuf,
    pub previous: GeoPosition,
    pub current: GeoPosition,
}

/// One image's timestamp before and after an adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampChange {
    pub id: PathBuf,
    pub previous: Option<String>,
    pub current: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub is_valid: bool,
    /// Photo library entries are never written by the save pipeline
    pub library_asset: bool,

    pub timestamp: Option<String>,
    pub location: Option<Coordinate>,
    pub elevation: Option<f64>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,

    pub original_timestamp: Option<String>,
    pub original_location: Option<Coordinate>,
    pub original_elevation: Option<f64>,

    pub sidecar_path: PathBuf,
    pub sidecar_exists: bool,
}

impl ImageRecord {
    /// A record with no metadata. It is not valid until metadata is loaded.
    pub fn new(path: PathBuf) -> Self {
        let sidecar_path = path.with_extension(XMP_EXTENSION);
        let sidecar_exists = sidecar_path != path && sidecar_path.exists();
        Self {
            path,
            is_valid: false,
            library_asset: false,
            timestamp: None,
            location: None,
            elevation: None,
            city: None,
            state: None,
            country: None,
            country_code: None,
            original_timestamp: None,
            original_location: None,
            original_elevation: None,
            sidecar_path,
            sidecar_exists,
        }
    }

    /// A valid record whose current and original values come from `meta`.
    pub fn from_metadata(path: PathBuf, meta: ImageMetadata) -> Self {
        let mut image = Self::new(path);
        image.is_valid = true;
        image.apply_loaded(meta);
        image
    }

    /// Read an image (and its sidecar, which takes precedence) through
    /// ExifTool. Files ExifTool can't write come back as invalid records.
    pub fn load(path: &Path, program: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(GeoTagError::InvalidPath(path.display().to_string()));
        }

        let mut image = Self::new(path.to_path_buf());
        if !exiftool::file_type_is_writable(program, path) {
            log::info!("{} is not writable by exiftool", path.display());
            return Ok(image);
        }

        let meta = exiftool::read_metadata(program, path)?;
        image.apply_loaded(meta);
        image.is_valid = true;

        if image.sidecar_exists {
            let presenter = SidecarPresenter::new(&image.sidecar_path);
            let result = {
                let _reading = presenter.read();
                exiftool::read_metadata(program, &image.sidecar_path)
            };
            match result {
                Ok(xmp) => image.apply_sidecar(xmp),
                Err(e) => log::warn!(
                    "Could not read sidecar {}: {}",
                    image.sidecar_path.display(),
                    e
                ),
            }
        }
        Ok(image)
    }

    fn apply_loaded(&mut self, meta: ImageMetadata) {
        self.timestamp = meta.date_time_original;
        self.location = meta.location;
        self.elevation = meta.elevation;
        self.city = meta.city;
        self.state = meta.state;
        self.country = meta.country;
        self.country_code = meta.country_code;
        self.original_timestamp = self.timestamp.clone();
        self.original_location = self.location;
        self.original_elevation = self.elevation;
    }

    fn apply_sidecar(&mut self, meta: ImageMetadata) {
        if meta.date_time_original.is_some() {
            self.timestamp = meta.date_time_original;
            self.original_timestamp = self.timestamp.clone();
        }
        if meta.location.is_some() {
            self.location = meta.location;
            self.elevation = meta.elevation;
            self.original_location = self.location;
            self.original_elevation = self.elevation;
        }
    }

    pub fn id(&self) -> &Path {
        &self.path
    }

    /// File name, marked with "*" when a sidecar exists.
    pub fn name(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.sidecar_exists {
            format!("{}*", name)
        } else {
            name
        }
    }

    pub fn changed(&self) -> bool {
        self.is_valid
            && (self.timestamp != self.original_timestamp
                || self.location != self.original_location
                || self.elevation != self.original_elevation)
    }

    pub fn timestamp_changed(&self) -> bool {
        self.timestamp != self.original_timestamp
    }

    /// Restore current values from the originals.
    pub fn revert(&mut self) {
        self.timestamp = self.original_timestamp.clone();
        self.location = self.original_location;
        self.elevation = self.original_elevation;
    }

    /// Advance the originals after a confirmed write.
    pub fn mark_saved(&mut self) {
        self.original_timestamp = self.timestamp.clone();
        self.original_location = self.location;
        self.original_elevation = self.elevation;
    }

    pub fn position(&self) -> GeoPosition {
        GeoPosition {
            location: self.location,
            elevation: self.elevation,
        }
    }

    /// Assign a new position and describe the change.
    pub fn set_position(&mut self, position: GeoPosition) -> LocationChange {
        let previous = self.position();
        self.location = position.location;
        self.elevation = position.elevation;
        LocationChange {
            id: self.path.clone(),
            previous,
            current: position,
        }
    }

    /// Re-apply a recorded change. Changes for other images are ignored.
    pub fn redo(&mut self, change: &LocationChange) -> bool {
        self.restore(change, change.current)
    }

    /// Roll back a recorded change. Changes for other images are ignored.
    pub fn undo(&mut self, change: &LocationChange) -> bool {
        self.restore(change, change.previous)
    }

    fn restore(&mut self, change: &LocationChange, position: GeoPosition) -> bool {
        if change.id != self.path {
            return false;
        }
        self.location = position.location;
        self.elevation = position.elevation;
        true
    }

    /// The timestamp as an instant, read in `zone` (local time when `None`).
    pub fn timestamp_in(&self, zone: Option<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let text = self.timestamp.as_deref()?.trim();
        let naive = NaiveDateTime::parse_from_str(text, IMAGE_DATE_FORMAT).ok()?;
        instant_in(naive, zone)
    }

    /// Assign a new timestamp and describe the change.
    pub fn set_timestamp(&mut self, timestamp: Option<String>) -> TimestampChange {
        let previous = std::mem::replace(&mut self.timestamp, timestamp.clone());
        TimestampChange {
            id: self.path.clone(),
            previous,
            current: timestamp,
        }
    }

    pub fn redo_timestamp(&mut self, change: &TimestampChange) -> bool {
        self.restore_timestamp(change, &change.current)
    }

    pub fn undo_timestamp(&mut self, change: &TimestampChange) -> bool {
        self.restore_timestamp(change, &change.previous)
    }

    fn restore_timestamp(&mut self, change: &TimestampChange, value: &Option<String>) -> bool {
        if change.id != self.path {
            return false;
        }
        self.timestamp = value.clone();
        true
    }

    pub fn epoch(&self, zone: Option<FixedOffset>) -> Option<i64> {
        self.timestamp_in(zone).map(|dt| dt.timestamp())
    }

    /// UTC timestamp for the GPS date/time tags.
    pub fn gps_timestamp(&self, zone: Option<FixedOffset>) -> Option<String> {
        self.timestamp_in(zone).map(|dt| {
            dt.with_timezone(&Utc)
                .format(GPS_TIMESTAMP_FORMAT)
                .to_string()
        })
    }
}

/// A wall-clock time in `zone` (local time when `None`) as an instant.
/// Local times skipped by a DST change have no instant.
pub fn instant_in(naive: NaiveDateTime, zone: Option<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    match zone {
        Some(offset) => offset.from_local_datetime(&naive).single(),
        None => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.fixed_offset()),
    }
}

/// The wall-clock time of `instant` in `zone` (local time when `None`).
pub fn wall_clock_in(instant: DateTime<FixedOffset>, zone: Option<FixedOffset>) -> NaiveDateTime {
    match zone {
        Some(offset) => instant.with_timezone(&offset).naive_local(),
        None => instant.with_timezone(&Local).naive_local(),
    }
}

/// Image files under `root`, sorted by path. Hidden entries are skipped.
pub fn discover_images(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_image_extension(e.path()))
        .map(|e| e.into_path())
        .collect();
    found.sort();
    found
}

/// Load every image in `paths`, logging and skipping the ones that fail.
pub fn load_images(paths: &[PathBuf], program: &Path) -> Vec<ImageRecord> {
    paths
        .iter()
        .filter_map(|path| match ImageRecord::load(path, program) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(timestamp: &str) -> ImageRecord {
        ImageRecord::from_metadata(
            PathBuf::from("/photos/IMG_0001.jpg"),
            ImageMetadata {
                date_time_original: Some(timestamp.to_string()),
                location: Some(Coordinate::new(10.0, 20.0)),
                elevation: Some(5.0),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_new_record_is_unchanged() {
        let image = record("2023:05:01 10:00:00");
        assert!(image.is_valid);
        assert!(!image.changed());
    }

    #[test]
    fn test_changed_revert_and_mark_saved() {
        let mut image = record("2023:05:01 10:00:00");

        image.elevation = Some(6.0);
        assert!(image.changed());
        image.revert();
        assert!(!image.changed());
        assert_eq!(image.elevation, Some(5.0));

        image.timestamp = Some("2023:05:01 11:00:00".to_string());
        assert!(image.changed());
        assert!(image.timestamp_changed());
        image.mark_saved();
        assert!(!image.changed());
        assert_eq!(image.original_timestamp.as_deref(), Some("2023:05:01 11:00:00"));
    }

    #[test]
    fn test_invalid_images_never_change() {
        let mut image = ImageRecord::new(PathBuf::from("/photos/readme.txt"));
        image.location = Some(Coordinate::new(1.0, 1.0));
        assert!(!image.changed());
    }

    #[test]
    fn test_set_position_undo_redo() {
        let mut image = record("2023:05:01 10:00:00");
        let target = GeoPosition {
            location: Some(Coordinate::new(-1.0, -2.0)),
            elevation: None,
        };

        let change = image.set_position(target);
        assert_eq!(change.previous.location, Some(Coordinate::new(10.0, 20.0)));
        assert_eq!(change.current, target);
        assert_eq!(image.position(), target);

        assert!(image.undo(&change));
        assert_eq!(image.location, Some(Coordinate::new(10.0, 20.0)));
        assert!(image.redo(&change));
        assert_eq!(image.position(), target);

        let mut other = ImageRecord::new(PathBuf::from("/photos/other.jpg"));
        assert!(!other.undo(&change));
    }

    #[test]
    fn test_set_timestamp_undo_redo() {
        let mut image = record("2023:05:01 10:00:00");

        let change = image.set_timestamp(Some("2023:05:01 12:00:00".to_string()));
        assert_eq!(change.previous.as_deref(), Some("2023:05:01 10:00:00"));
        assert!(image.timestamp_changed());

        assert!(image.undo_timestamp(&change));
        assert!(!image.changed());
        assert!(image.redo_timestamp(&change));
        assert_eq!(image.timestamp.as_deref(), Some("2023:05:01 12:00:00"));

        let mut other = record("2020:01:01 00:00:00");
        other.path = PathBuf::from("/photos/other.jpg");
        assert!(!other.undo_timestamp(&change));
        assert_eq!(other.timestamp.as_deref(), Some("2020:01:01 00:00:00"));
    }

    #[test]
    fn test_wall_clock_round_trip() {
        let pacific = FixedOffset::west_opt(7 * 3600);
        let naive = NaiveDateTime::parse_from_str("2023:05:01 10:00:00", IMAGE_DATE_FORMAT).unwrap();
        let instant = instant_in(naive, pacific).unwrap();
        assert_eq!(instant.timestamp(), 1_682_960_400);
        assert_eq!(wall_clock_in(instant, pacific), naive);
        assert_eq!(
            wall_clock_in(instant, FixedOffset::east_opt(0)).to_string(),
            "2023-05-01 17:00:00"
        );
    }

    #[test]
    fn test_sidecar_path_and_detection() {
        let tmp = TempDir::new().unwrap();
        let photo = tmp.path().join("IMG_0002.CR2");
        std::fs::write(&photo, b"raw").unwrap();

        let image = ImageRecord::new(photo.clone());
        assert_eq!(image.sidecar_path, tmp.path().join("IMG_0002.xmp"));
        assert!(!image.sidecar_exists);
        assert_eq!(image.name(), "IMG_0002.CR2");

        std::fs::write(tmp.path().join("IMG_0002.xmp"), b"<x/>").unwrap();
        let image = ImageRecord::new(photo);
        assert!(image.sidecar_exists);
        assert_eq!(image.name(), "IMG_0002.CR2*");
    }

    #[test]
    fn test_xmp_file_is_not_its_own_sidecar() {
        let tmp = TempDir::new().unwrap();
        let xmp = tmp.path().join("only.xmp");
        std::fs::write(&xmp, b"<x/>").unwrap();
        assert!(!ImageRecord::new(xmp).sidecar_exists);
    }

    #[test]
    fn test_timestamps_in_fixed_zone() {
        let image = record("2023:05:01 10:00:00");
        let pacific = FixedOffset::west_opt(7 * 3600).unwrap();

        assert_eq!(image.epoch(Some(pacific)), Some(1_682_960_400));
        assert_eq!(
            image.gps_timestamp(Some(pacific)).as_deref(),
            Some("2023:05:01 17:00:00Z")
        );

        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(image.epoch(Some(utc)), Some(1_682_935_200));
    }

    #[test]
    fn test_unparseable_timestamp() {
        let image = record("sometime in May");
        assert_eq!(image.epoch(None), None);
        assert_eq!(image.gps_timestamp(None), None);
    }

    #[test]
    fn test_load_missing_file_is_invalid_path() {
        let tmp = TempDir::new().unwrap();
        let result = ImageRecord::load(&tmp.path().join("gone.jpg"), Path::new("exiftool"));
        assert!(matches!(result, Err(GeoTagError::InvalidPath(_))));
    }

    #[test]
    fn test_discover_images_skips_hidden_and_other_files() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("2023");
        let hidden = tmp.path().join(".cache");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(&hidden).unwrap();

        std::fs::write(tmp.path().join("b.JPG"), b"x").unwrap();
        std::fs::write(nested.join("a.heic"), b"x").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(tmp.path().join(".hidden.jpg"), b"x").unwrap();
        std::fs::write(hidden.join("c.jpg"), b"x").unwrap();

        let found = discover_images(tmp.path());
        assert_eq!(found, vec![nested.join("a.heic"), tmp.path().join("b.JPG")]);
    }
}
