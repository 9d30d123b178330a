// Coordinate text parsing and formatting
//
// Accepted input forms (R is an optional reference letter):
//   -dd.dddd R
//   -dd mm.mmmm R
//   -dd mm ss.ssss R
// Degree, minute and second marks are optional at the end of each part.

use std::ops::RangeInclusive;

use super::{CoordFormat, CoordFormatError};
use crate::constants::{LATITUDE_REFS, LONGITUDE_REFS, MAX_LATITUDE, MAX_LONGITUDE};

const MAX_PARTS: usize = 3;
const PART_MARKS: [char; MAX_PARTS] = ['°', '\'', '"'];
const NEGATIVE_REFS: [&str; 2] = ["S", "W"];

// Display precision: six decimals of minutes, four of seconds.
const MINUTE_SCALE: f64 = 1e6;
const SECOND_SCALE: f64 = 1e4;

type Result<T> = std::result::Result<T, CoordFormatError>;

/// Convert coordinate text to signed decimal degrees.
///
/// `range` bounds the whole number of degrees and the composed magnitude.
/// `references` lists the letters accepted as a trailing token; `S` and `W`
/// negate the value. A negative value combined with a negating reference is
/// rejected.
pub fn parse_coord(text: &str, range: RangeInclusive<u32>, references: &[&str]) -> Result<f64> {
    let mut parts: Vec<&str> = text.split_whitespace().collect();

    let mut negating_ref = None;
    if let Some(last) = parts.last() {
        let token = last.to_uppercase();
        if references.iter().any(|r| r.to_uppercase() == token) {
            if NEGATIVE_REFS.contains(&token.as_str()) {
                negating_ref = Some(token);
            }
            parts.pop();
        }
    }

    if parts.is_empty() {
        return Err(CoordFormatError::Empty);
    }
    if parts.len() > MAX_PARTS {
        return Err(CoordFormatError::TooManyParts);
    }

    let lower = *range.start() as f64;
    let upper = *range.end() as f64;
    let mut dms = [0.0_f64; MAX_PARTS];

    for (index, part) in parts.iter().enumerate() {
        let digits = part.strip_suffix(PART_MARKS[index]).unwrap_or(part);
        let value: f64 = digits
            .parse()
            .map_err(|_| CoordFormatError::NotANumber(part.to_string()))?;
        if !value.is_finite() {
            return Err(CoordFormatError::NotANumber(part.to_string()));
        }

        if index == 0 {
            if let Some(ref reference) = negating_ref {
                if value.is_sign_negative() {
                    return Err(CoordFormatError::NegativeWithReference(reference.clone()));
                }
            }
            let whole = value.trunc().abs();
            if whole < lower || whole > upper {
                return Err(CoordFormatError::OutOfRange(part.to_string()));
            }
        } else if !(0.0..60.0).contains(&value) {
            return Err(CoordFormatError::OutOfRange(part.to_string()));
        }
        dms[index] = value;
    }

    let magnitude = dms[0].abs() + dms[1] / 60.0 + dms[2] / 3600.0;
    if magnitude > upper {
        return Err(CoordFormatError::OutOfRange(text.trim().to_string()));
    }

    // "-0 30" is negative too
    let negative = negating_ref.is_some() || dms[0].is_sign_negative();
    Ok(if negative { -magnitude } else { magnitude })
}

pub fn parse_latitude(text: &str) -> Result<f64> {
    parse_coord(text, 0..=MAX_LATITUDE, &LATITUDE_REFS)
}

pub fn parse_longitude(text: &str) -> Result<f64> {
    parse_coord(text, 0..=MAX_LONGITUDE, &LONGITUDE_REFS)
}

/// Render a coordinate value in the given style. `None` renders as "".
///
/// `references` is `[positive, negative]`, e.g. `["N", "S"]`.
pub fn format_coord(value: Option<f64>, style: CoordFormat, references: &[&str]) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let reference = if value >= 0.0 {
        references.first().copied().unwrap_or("")
    } else {
        references.get(1).copied().unwrap_or("")
    };

    match style {
        CoordFormat::Decimal => {
            let pad = if value < 0.0 { "" } else { " " };
            format!("{}{:.6}", pad, value)
        }
        CoordFormat::DegMin => {
            // round once at display precision so minutes never print as 60
            let total_minutes = (value.abs() * 60.0 * MINUTE_SCALE).round() / MINUTE_SCALE;
            let degrees = (total_minutes / 60.0).floor();
            let minutes = (total_minutes - degrees * 60.0).max(0.0);
            format!("{}° {:.6}' {}", degrees as i64, minutes, reference)
        }
        CoordFormat::DegMinSec => {
            let total_seconds = (value.abs() * 3600.0 * SECOND_SCALE).round() / SECOND_SCALE;
            let degrees = (total_seconds / 3600.0).floor();
            let remainder = (total_seconds - degrees * 3600.0).max(0.0);
            let minutes = (remainder / 60.0).floor();
            let seconds = (remainder - minutes * 60.0).max(0.0);
            format!(
                "{}° {}' {:.4}\" {}",
                degrees as i64, minutes as i64, seconds, reference
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: [CoordFormat; 3] = [
        CoordFormat::Decimal,
        CoordFormat::DegMin,
        CoordFormat::DegMinSec,
    ];

    #[test]
    fn test_parse_decimal_degrees() {
        assert_eq!(parse_latitude("37.5").unwrap(), 37.5);
        assert_eq!(parse_latitude("-37.5").unwrap(), -37.5);
        assert_eq!(parse_latitude("37.5°").unwrap(), 37.5);
        assert_eq!(parse_longitude("122.25 W").unwrap(), -122.25);
        assert_eq!(parse_longitude("122.25 e").unwrap(), 122.25);
    }

    #[test]
    fn test_parse_degrees_minutes_seconds() {
        let value = parse_latitude("37° 30' 36\" N").unwrap();
        assert!((value - 37.51).abs() < 1e-9);

        let value = parse_longitude("122 15.5 W").unwrap();
        assert!((value - -122.258_333_333).abs() < 1e-6);
    }

    #[test]
    fn test_negative_degrees_apply_to_whole_value() {
        let value = parse_latitude("-10 30").unwrap();
        assert!((value - -10.5).abs() < 1e-12);
    }

    #[test]
    fn test_negative_zero_degrees_keep_their_sign() {
        assert_eq!(parse_latitude("-0 30").unwrap(), -0.5);
        let value = parse_longitude("-0 7 39").unwrap();
        assert!((value - -0.1275).abs() < 1e-12);
        assert_eq!(
            parse_latitude("-0 30 S"),
            Err(CoordFormatError::NegativeWithReference("S".to_string()))
        );
        assert_eq!(
            parse_longitude("-0 7 39 W"),
            Err(CoordFormatError::NegativeWithReference("W".to_string()))
        );
    }

    #[test]
    fn test_rejects_more_than_three_parts() {
        assert_eq!(
            parse_latitude("10 20 30 40"),
            Err(CoordFormatError::TooManyParts)
        );
        assert_eq!(
            parse_latitude("10 20 30 40 N"),
            Err(CoordFormatError::TooManyParts)
        );
    }

    #[test]
    fn test_rejects_minutes_or_seconds_of_sixty() {
        assert!(matches!(
            parse_latitude("10 60"),
            Err(CoordFormatError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_latitude("10 59 60"),
            Err(CoordFormatError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_latitude("10 -5"),
            Err(CoordFormatError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_rejects_degrees_outside_range() {
        assert!(matches!(
            parse_latitude("91"),
            Err(CoordFormatError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_latitude("-91"),
            Err(CoordFormatError::OutOfRange(_))
        ));
        assert!(matches!(
            parse_longitude("181 W"),
            Err(CoordFormatError::OutOfRange(_))
        ));
        // whole degrees in range but the composed value is not
        assert!(matches!(
            parse_latitude("90 30"),
            Err(CoordFormatError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_rejects_negative_value_with_negative_reference() {
        assert_eq!(
            parse_latitude("-10 S"),
            Err(CoordFormatError::NegativeWithReference("S".to_string()))
        );
        assert_eq!(
            parse_longitude("-10 30 w"),
            Err(CoordFormatError::NegativeWithReference("W".to_string()))
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_latitude(""), Err(CoordFormatError::Empty));
        assert_eq!(parse_latitude("N"), Err(CoordFormatError::Empty));
        assert!(matches!(
            parse_latitude("ten"),
            Err(CoordFormatError::NotANumber(_))
        ));
        assert!(matches!(
            parse_latitude("inf"),
            Err(CoordFormatError::NotANumber(_))
        ));
        // a longitude reference is not accepted for a latitude
        assert!(matches!(
            parse_latitude("10 E"),
            Err(CoordFormatError::NotANumber(_))
        ));
    }

    #[test]
    fn test_format_zero() {
        assert_eq!(format_coord(Some(0.0), CoordFormat::Decimal, &LATITUDE_REFS), " 0.000000");
        assert_eq!(format_coord(Some(0.0), CoordFormat::DegMin, &LATITUDE_REFS), "0° 0.000000' N");
        assert_eq!(
            format_coord(Some(0.0), CoordFormat::DegMinSec, &LONGITUDE_REFS),
            "0° 0' 0.0000\" E"
        );
    }

    #[test]
    fn test_format_negative_values() {
        assert_eq!(format_coord(Some(-12.5), CoordFormat::Decimal, &LATITUDE_REFS), "-12.500000");
        assert_eq!(format_coord(Some(-12.5), CoordFormat::DegMin, &LATITUDE_REFS), "12° 30.000000' S");
        assert_eq!(
            format_coord(Some(-122.51), CoordFormat::DegMinSec, &LONGITUDE_REFS),
            "122° 30' 36.0000\" W"
        );
    }

    #[test]
    fn test_format_none_is_empty() {
        for style in STYLES {
            assert_eq!(format_coord(None, style, &LATITUDE_REFS), "");
        }
    }

    #[test]
    fn test_format_carries_rounded_minutes() {
        // 10.99999999999 would show 60 minutes without carrying
        let text = format_coord(Some(10.999_999_999_99), CoordFormat::DegMin, &LATITUDE_REFS);
        assert_eq!(text, "11° 0.000000' N");
        let text = format_coord(Some(10.999_999_999_99), CoordFormat::DegMinSec, &LATITUDE_REFS);
        assert_eq!(text, "11° 0' 0.0000\" N");
    }

    #[test]
    fn test_round_trip_every_style() {
        let latitudes = [0.0, 37.774_929_5, -33.868_819_9, 89.999_999, -90.0, 1.0 / 3.0, -0.000_123];
        let longitudes = [0.0, -122.419_415_5, 151.209_295_5, 179.999_999, -180.0, 45.123_456_7];

        for style in STYLES {
            for lat in latitudes {
                let text = format_coord(Some(lat), style, &LATITUDE_REFS);
                let parsed = parse_latitude(&text).unwrap();
                assert!(
                    (parsed - lat).abs() < 1e-6,
                    "{:?}: {} -> {:?} -> {}",
                    style,
                    lat,
                    text,
                    parsed
                );
            }
            for lon in longitudes {
                let text = format_coord(Some(lon), style, &LONGITUDE_REFS);
                let parsed = parse_longitude(&text).unwrap();
                assert!(
                    (parsed - lon).abs() < 1e-6,
                    "{:?}: {} -> {:?} -> {}",
                    style,
                    lon,
                    text,
                    parsed
                );
            }
        }
    }
}
