// Batch date/time adjustment
//
// One offset is applied to the timestamp of every valid image. The offset
// usually comes from a reference image: the difference between its current
// time and the time the user says it should have been.

use chrono::{FixedOffset, Local, NaiveDateTime, TimeDelta};

use crate::constants::IMAGE_DATE_FORMAT;
use crate::image::{instant_in, wall_clock_in, ImageRecord, TimestampChange};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAdjustment {
    pub delta: TimeDelta,
    /// Given to images that have no readable timestamp; they are skipped
    /// when `None`
    pub fallback: Option<NaiveDateTime>,
}

impl TimeAdjustment {
    /// A plain shift. `None` when the shift is out of range.
    pub fn by_seconds(secs: i64) -> Option<Self> {
        Some(Self {
            delta: TimeDelta::try_seconds(secs)?,
            fallback: None,
        })
    }

    /// The shift that moves `reference` to `new_time`, both read in `zone`.
    /// A reference without a readable timestamp counts as now. `None` when
    /// `new_time` does not exist in `zone`.
    pub fn from_reference(
        reference: &ImageRecord,
        new_time: NaiveDateTime,
        zone: Option<FixedOffset>,
    ) -> Option<Self> {
        let new_instant = instant_in(new_time, zone)?;
        let old_instant = reference
            .timestamp_in(zone)
            .unwrap_or_else(|| Local::now().fixed_offset());
        Some(Self {
            delta: new_instant - old_instant,
            fallback: Some(new_time),
        })
    }
}

/// Shift every valid image's timestamp by `adjustment.delta`, read and
/// written in `zone` (local time when `None`). Images whose timestamp would
/// not change produce no change entry.
pub fn adjust_timestamps(
    images: &mut [ImageRecord],
    adjustment: &TimeAdjustment,
    zone: Option<FixedOffset>,
) -> Vec<TimestampChange> {
    let mut changes = Vec::new();

    for image in images.iter_mut().filter(|i| i.is_valid) {
        let updated = match image.timestamp_in(zone) {
            Some(instant) => match instant.checked_add_signed(adjustment.delta) {
                Some(moved) => wall_clock_in(moved, zone),
                None => {
                    log::warn!("{}: shifted time out of range", image.path.display());
                    continue;
                }
            },
            None => match adjustment.fallback {
                Some(fallback) => fallback,
                None => {
                    log::debug!("{} has no usable timestamp", image.path.display());
                    continue;
                }
            },
        };

        let text = updated.format(IMAGE_DATE_FORMAT).to_string();
        if image.timestamp.as_deref() == Some(text.as_str()) {
            continue;
        }
        changes.push(image.set_timestamp(Some(text)));
    }

    log::info!("Adjusted timestamps of {} images", changes.len());
    changes
}
