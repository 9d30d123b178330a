// GeoTag settings
// Stored as JSON in the user's config directory. Missing fields take their
// defaults so older files keep loading.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::constants::{
    BACKUP_RETENTION_DAYS, DEFAULT_MATCH_TOLERANCE_SECS, DEFAULT_TAG_NAME, SETTINGS_FILENAME,
    TEMP_FILE_PREFIX,
};
use crate::coords::CoordFormat;
use crate::error::{GeoTagError, Result};
use crate::locate::LocateOptions;
use crate::save::{default_max_workers, default_staging_root, SaveOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub coordinate_format: CoordFormat,
    pub make_backups: bool,
    pub backup_folder: Option<PathBuf>,
    pub verify_backups: bool,
    pub backup_retention_days: i64,
    pub create_sidecar_files: bool,
    pub add_tags: bool,
    pub tag_name: String,
    pub update_file_modification_times: bool,
    pub update_gps_timestamps: bool,
    pub match_tolerance_secs: f64,
    /// Offset of image timestamps from UTC; local time when unset
    pub utc_offset_secs: Option<i32>,
    pub staging_folder: Option<PathBuf>,
    pub max_workers: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coordinate_format: CoordFormat::default(),
            make_backups: true,
            backup_folder: None,
            verify_backups: false,
            backup_retention_days: BACKUP_RETENTION_DAYS,
            create_sidecar_files: false,
            add_tags: false,
            tag_name: DEFAULT_TAG_NAME.to_string(),
            update_file_modification_times: false,
            update_gps_timestamps: false,
            match_tolerance_secs: DEFAULT_MATCH_TOLERANCE_SECS,
            utc_offset_secs: None,
            staging_folder: None,
            max_workers: None,
        }
    }
}

impl Settings {
    /// Settings file in the platform config directory, if one can be found.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "snafu", "GeoTag")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILENAME))
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            GeoTagError::Settings(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// Write settings atomically: temp file, fsync, rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = dir.join(format!("{}{}", TEMP_FILE_PREFIX, SETTINGS_FILENAME));
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        if let Ok(dir) = fs::File::open(dir) {
            let _ = dir.sync_all();
        }
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Zone image timestamps are read in. An out of range offset falls back
    /// to local time.
    pub fn time_zone(&self) -> Option<FixedOffset> {
        let secs = self.utc_offset_secs?;
        let zone = FixedOffset::east_opt(secs);
        if zone.is_none() {
            log::warn!("Ignoring invalid UTC offset {} seconds", secs);
        }
        zone
    }

    pub fn locate_options(&self) -> LocateOptions {
        LocateOptions {
            tolerance_secs: self.match_tolerance_secs,
            time_zone: self.time_zone(),
        }
    }

    pub fn save_options(&self) -> SaveOptions {
        SaveOptions {
            make_backups: self.make_backups,
            backup_folder: self.backup_folder.clone(),
            verify_backups: self.verify_backups,
            create_sidecars: self.create_sidecar_files,
            tag_name: self.add_tags.then(|| self.tag_name.clone()),
            update_file_modification_times: self.update_file_modification_times,
            update_gps_timestamps: self.update_gps_timestamps,
            time_zone: self.time_zone(),
            staging_root: self
                .staging_folder
                .clone()
                .unwrap_or_else(default_staging_root),
            max_workers: self.max_workers.unwrap_or_else(default_max_workers).max(1),
        }
    }
}
