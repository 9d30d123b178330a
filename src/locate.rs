// Assign image locations from loaded track logs

use chrono::FixedOffset;

use crate::constants::DEFAULT_MATCH_TOLERANCE_SECS;
use crate::gpx::{search_logs, TrackLog};
use crate::image::{GeoPosition, ImageRecord, LocationChange};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocateOptions {
    /// Largest accepted gap between image time and track point time
    pub tolerance_secs: f64,
    /// Zone image timestamps were recorded in; local time when `None`
    pub time_zone: Option<FixedOffset>,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            tolerance_secs: DEFAULT_MATCH_TOLERANCE_SECS,
            time_zone: None,
        }
    }
}

/// Give every valid image with a readable timestamp the position of its
/// matching track point. Images with no match, or whose position would not
/// change, are left alone and produce no change entry.
pub fn locate_from_tracks(
    images: &mut [ImageRecord],
    logs: &[TrackLog],
    options: &LocateOptions,
) -> Vec<LocationChange> {
    let mut changes = Vec::new();

    for image in images.iter_mut().filter(|i| i.is_valid) {
        let Some(epoch) = image.epoch(options.time_zone) else {
            log::debug!("{} has no usable timestamp", image.path.display());
            continue;
        };
        let Some(found) = search_logs(logs, epoch, options.tolerance_secs) else {
            continue;
        };

        let position = GeoPosition {
            location: Some(found.coordinate),
            elevation: found.elevation,
        };
        if image.position() != position {
            changes.push(image.set_position(position));
        }
    }

    log::info!("Located {} of {} images", changes.len(), images.len());
    changes
}
