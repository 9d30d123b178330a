// Track point lookup by time

use super::{Track, TrackLog, TrackPoint};
use crate::coords::Coordinate;

/// Position taken from the track point matched to an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMatch {
    pub coordinate: Coordinate,
    pub elevation: Option<f64>,
    pub point_time: i64,
}

impl From<&TrackPoint> for TrackMatch {
    fn from(point: &TrackPoint) -> Self {
        Self {
            coordinate: Coordinate::new(point.latitude, point.longitude),
            elevation: point.elevation,
            point_time: point.epoch(),
        }
    }
}

/// Find the latest point recorded at or before `image_epoch`.
///
/// Tracks and segments are not assumed to be sorted relative to each other,
/// so every segment is examined. Within a segment points are in recording
/// order and only the leading run at or before the image time counts.
/// The point is rejected when it is `tolerance_secs` or more away from the
/// image time.
pub fn search(tracks: &[Track], image_epoch: i64, tolerance_secs: f64) -> Option<TrackMatch> {
    let mut best: Option<&TrackPoint> = None;

    for segment in tracks.iter().flat_map(|t| t.segments.iter()) {
        let candidate = segment
            .points
            .iter()
            .take_while(|p| p.epoch() <= image_epoch)
            .last();

        if let Some(point) = candidate {
            match best {
                Some(current) if point.epoch() <= current.epoch() => {}
                _ => best = Some(point),
            }
        }
    }

    let point = best?;
    let gap = (point.epoch() - image_epoch).abs() as f64;
    (gap < tolerance_secs).then(|| TrackMatch::from(point))
}

/// Search every log and keep the match closest before the image time.
pub fn search_logs<'a, I>(logs: I, image_epoch: i64, tolerance_secs: f64) -> Option<TrackMatch>
where
    I: IntoIterator<Item = &'a TrackLog>,
{
    logs.into_iter()
        .filter_map(|log| search(&log.tracks, image_epoch, tolerance_secs))
        .fold(None, |best: Option<TrackMatch>, found| match best {
            Some(current) if found.point_time <= current.point_time => Some(current),
            _ => Some(found),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpx::Segment;

    fn point_at(epoch: i64, lat: f64) -> TrackPoint {
        let time = chrono::DateTime::from_timestamp(epoch, 0)
            .unwrap()
            .to_rfc3339();
        TrackPoint::new(lat, 0.0).with_time(time)
    }

    fn segment(points: &[(i64, f64)]) -> Segment {
        Segment {
            points: points.iter().map(|&(t, lat)| point_at(t, lat)).collect(),
        }
    }

    #[test]
    fn test_picks_latest_point_across_segments() {
        let tracks = vec![Track {
            segments: vec![segment(&[(100, 1.0), (200, 2.0)]), segment(&[(150, 3.0), (250, 4.0)])],
        }];

        let found = search(&tracks, 180, 3600.0).unwrap();
        assert_eq!(found.point_time, 150);
        assert_eq!(found.coordinate, Coordinate::new(3.0, 0.0));
    }

    #[test]
    fn test_picks_latest_point_across_tracks() {
        let tracks = vec![
            Track {
                segments: vec![segment(&[(150, 3.0), (250, 4.0)])],
            },
            Track {
                segments: vec![segment(&[(100, 1.0), (200, 2.0)])],
            },
        ];

        let found = search(&tracks, 180, 3600.0).unwrap();
        assert_eq!(found.point_time, 150);
    }

    #[test]
    fn test_exact_time_matches() {
        let tracks = vec![Track {
            segments: vec![segment(&[(100, 1.0), (200, 2.0)])],
        }];
        let found = search(&tracks, 200, 1.0).unwrap();
        assert_eq!(found.coordinate.latitude, 2.0);
    }

    #[test]
    fn test_rejects_point_outside_tolerance() {
        let tracks = vec![Track {
            segments: vec![segment(&[(0, 1.0)])],
        }];
        assert!(search(&tracks, 21_600, 21_600.0).is_none());
        assert!(search(&tracks, 21_599, 21_600.0).is_some());
    }

    #[test]
    fn test_no_point_before_image() {
        let tracks = vec![Track {
            segments: vec![segment(&[(100, 1.0), (200, 2.0)])],
        }];
        assert!(search(&tracks, 50, 3600.0).is_none());
    }

    #[test]
    fn test_first_candidate_wins_ties() {
        let tracks = vec![Track {
            segments: vec![segment(&[(100, 1.0)]), segment(&[(100, 2.0)])],
        }];
        let found = search(&tracks, 120, 3600.0).unwrap();
        assert_eq!(found.coordinate.latitude, 1.0);
    }

    #[test]
    fn test_search_logs_prefers_closest_earlier_point() {
        let early = TrackLog {
            tracks: vec![Track {
                segments: vec![segment(&[(100, 1.0)])],
            }],
        };
        let late = TrackLog {
            tracks: vec![Track {
                segments: vec![segment(&[(160, 5.0)])],
            }],
        };

        let found = search_logs([&late, &early], 180, 3600.0).unwrap();
        assert_eq!(found.coordinate.latitude, 5.0);
        assert!(search_logs(Vec::<&TrackLog>::new(), 180, 3600.0).is_none());
    }
}
