// Image metadata access
//
// Reading and writing both go through ExifTool. Writers are behind the
// MetadataWriter trait so the save pipeline can run against a fake.

pub mod exiftool;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;
use crate::error::Result;
use crate::image::ImageRecord;

/// Location and time values read from an image or its sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub date_time_original: Option<String>,
    pub location: Option<Coordinate>,
    pub elevation: Option<f64>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

/// One ExifTool update of a staged file.
#[derive(Debug, Clone)]
pub struct WriteRequest<'a> {
    pub image: &'a ImageRecord,
    /// Staged path ExifTool writes through (image or sidecar link)
    pub target: PathBuf,
    pub target_is_sidecar: bool,
    pub overwrite_in_place: bool,
    pub update_file_modification_time: bool,
    /// UTC "YYYY:MM:DD HH:MM:SSZ", when GPS timestamps should be written
    pub gps_timestamp: Option<String>,
}

pub trait MetadataWriter: Sync {
    /// Create `sidecar` holding the tags of `image`.
    fn make_sidecar(&self, image: &Path, sidecar: &Path) -> Result<()>;

    /// Apply the image's current location and time to the request target.
    fn write(&self, request: &WriteRequest) -> Result<()>;

    /// Add a user tag to the file at `path`.
    fn add_tag(&self, path: &Path, tag: &str) -> Result<()>;
}

/// The real writer: runs the resolved ExifTool binary.
#[derive(Debug, Clone)]
pub struct ExifToolWriter {
    program: PathBuf,
}

impl ExifToolWriter {
    pub fn new() -> Self {
        Self {
            program: crate::tools::exiftool_path(),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for ExifToolWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataWriter for ExifToolWriter {
    fn make_sidecar(&self, image: &Path, sidecar: &Path) -> Result<()> {
        exiftool::make_sidecar(&self.program, image, sidecar)
    }

    fn write(&self, request: &WriteRequest) -> Result<()> {
        exiftool::write_metadata(&self.program, request)
    }

    fn add_tag(&self, path: &Path, tag: &str) -> Result<()> {
        exiftool::add_tag(&self.program, path, tag)
    }
}

/// Determine whether a path names a supported image by extension.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|ext| crate::constants::IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
