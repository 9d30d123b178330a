// Position estimation between two located images
//
// Images taken between two anchors are placed along the great circle from
// the earlier anchor toward the later one, assuming constant speed.

use chrono::FixedOffset;
use thiserror::Error;

use crate::coords::Coordinate;
use crate::geodesy::{destination, distance_and_bearing};
use crate::image::{GeoPosition, ImageRecord, LocationChange};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpolateError {
    #[error("exactly two images with a location are required, found {0}")]
    AnchorCount(usize),

    #[error("image {0} has no usable timestamp")]
    AnchorTimestamp(String),
}

struct Anchor {
    epoch: i64,
    coordinate: Coordinate,
    elevation: Option<f64>,
}

/// Fill in locations for images timed strictly between the two images that
/// already have one. Elevation is interpolated linearly when both anchors
/// carry one.
pub fn interpolate(
    images: &mut [ImageRecord],
    time_zone: Option<FixedOffset>,
) -> Result<Vec<LocationChange>, InterpolateError> {
    let located: Vec<&ImageRecord> = images.iter().filter(|i| i.location.is_some()).collect();
    if located.len() != 2 {
        return Err(InterpolateError::AnchorCount(located.len()));
    }

    let mut anchors = Vec::with_capacity(2);
    for image in located {
        let epoch = image
            .epoch(time_zone)
            .ok_or_else(|| InterpolateError::AnchorTimestamp(image.path.display().to_string()))?;
        let Some(coordinate) = image.location else {
            continue;
        };
        anchors.push(Anchor {
            epoch,
            coordinate,
            elevation: image.elevation,
        });
    }

    anchors.sort_by_key(|a| a.epoch);
    let (start, end) = (&anchors[0], &anchors[1]);
    if start.epoch == end.epoch {
        return Ok(Vec::new());
    }

    let (distance, bearing) = distance_and_bearing(
        start.coordinate.latitude,
        start.coordinate.longitude,
        end.coordinate.latitude,
        end.coordinate.longitude,
    );
    let span = (end.epoch - start.epoch) as f64;
    let speed = distance / span;

    let mut changes = Vec::new();
    for image in images.iter_mut().filter(|i| i.location.is_none()) {
        let Some(epoch) = image.epoch(time_zone) else {
            continue;
        };
        if epoch <= start.epoch || epoch >= end.epoch {
            continue;
        }

        let elapsed = (epoch - start.epoch) as f64;
        let (lat, lon) = destination(
            start.coordinate.latitude,
            start.coordinate.longitude,
            speed * elapsed,
            bearing,
        );
        let elevation = match (start.elevation, end.elevation) {
            (Some(a), Some(b)) => Some(a + (b - a) * elapsed / span),
            _ => None,
        };
        changes.push(image.set_position(GeoPosition {
            location: Some(Coordinate::new(lat, lon)),
            elevation,
        }));
    }

    log::info!("Interpolated {} image locations", changes.len());
    Ok(changes)
}
