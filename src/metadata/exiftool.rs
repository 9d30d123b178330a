// ExifTool wrapper for geolocation metadata

use std::path::Path;
use std::process::{Command, Output};

use crate::constants::WRITABLE_FILE_TYPES;
use crate::coords::Coordinate;
use crate::error::{GeoTagError, Result};

use super::{ImageMetadata, WriteRequest};

/// Tags requested when reading an image or sidecar.
const READ_TAGS: [&str; 13] = [
    "-DateTimeOriginal",
    "-CreateDate",
    "-GPSStatus",
    "-GPSLatitude",
    "-GPSLatitudeRef",
    "-GPSLongitude",
    "-GPSLongitudeRef",
    "-GPSAltitude",
    "-GPSAltitudeRef",
    "-City",
    "-State",
    "-Country",
    "-CountryCode",
];

/// Run exiftool with `args` followed by `path`.
/// A non-zero exit turns stderr into the error message; stderr on success
/// is only logged.
fn run(program: &Path, args: &[String], path: &Path) -> Result<Output> {
    let output = Command::new(program)
        .args(args)
        .arg(path)
        .output()
        .map_err(|e| GeoTagError::ExifTool(format!("Failed to run exiftool: {}", e)))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let message = if stderr.is_empty() {
            format!("exiftool exited with code {} for {}", code, path.display())
        } else {
            stderr.to_string()
        };
        return Err(GeoTagError::ExifTool(message));
    }

    if !stderr.is_empty() {
        log::warn!("exiftool stderr for {}: {}", path.display(), stderr);
    }
    Ok(output)
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Build the tag arguments for an update. The target path is not included;
/// it is always passed last.
pub fn update_args(request: &WriteRequest) -> Vec<String> {
    let image = request.image;

    let mut lat = String::from("-GPSLatitude=");
    let mut lat_ref = String::from("-GPSLatitudeRef=");
    let mut lon = String::from("-GPSLongitude=");
    let mut lon_ref = String::from("-GPSLongitudeRef=");
    let mut ele = String::from("-GPSAltitude=");
    let mut ele_ref = String::from("-GPSAltitudeRef=");
    let mut city = String::from("-City=");
    let mut state = String::from("-State=");
    let mut country = String::from("-Country=");
    let mut country_code = String::from("-CountryCode=");

    // ExifTool derives the reference letter from the sign
    if let Some(location) = image.location {
        lat.push_str(&location.latitude.to_string());
        lat_ref.push_str(&location.latitude.to_string());
        lon.push_str(&location.longitude.to_string());
        lon_ref.push_str(&location.longitude.to_string());
        if let Some(elevation) = image.elevation {
            if elevation >= 0.0 {
                ele.push_str(&elevation.to_string());
                ele_ref.push('0');
            } else {
                ele.push_str(&(-elevation).to_string());
                ele_ref.push('1');
            }
        }
        city.push_str(image.city.as_deref().unwrap_or(""));
        state.push_str(image.state.as_deref().unwrap_or(""));
        country.push_str(image.country.as_deref().unwrap_or(""));
        country_code.push_str(image.country_code.as_deref().unwrap_or(""));
    }

    let mut args = to_args(&["-q", "-m"]);
    if request.overwrite_in_place {
        args.push("-overwrite_original_in_place".to_string());
    }
    args.extend([
        lat,
        lat_ref,
        lon,
        lon_ref,
        ele,
        ele_ref,
        city,
        state,
        country,
        country_code,
    ]);

    if request.update_file_modification_time {
        args.push("-FileModifyDate<DateTimeOriginal".to_string());
    }

    if let Some(ref timestamp) = request.gps_timestamp {
        if request.target_is_sidecar {
            args.push(format!("-GPSDateTime={}", timestamp));
        } else if let Some((date, time)) = timestamp.split_once(' ') {
            args.push(format!("-GPSDateStamp={}", date));
            args.push(format!("-GPSTimeStamp={}", time));
        }
    }

    if image.timestamp_changed() {
        let timestamp = image.timestamp.as_deref().unwrap_or("");
        args.push(format!("-DateTimeOriginal={}", timestamp));
        args.push(format!("-CreateDate={}", timestamp));
    }

    args.push("-GPSStatus=".to_string());
    args
}

/// Write the image's current values to the request target.
pub fn write_metadata(program: &Path, request: &WriteRequest) -> Result<()> {
    let args = update_args(request);
    log::debug!("exiftool {:?} {}", args, request.target.display());
    run(program, &args, &request.target)?;
    Ok(())
}

/// ExifTool's FileType code for a file, if it reports one.
pub fn file_type(program: &Path, path: &Path) -> Result<Option<String>> {
    let output = run(
        program,
        &to_args(&["-m", "-q", "-S", "-fast3", "-FileType"]),
        path,
    )?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.split_whitespace().last().map(|s| s.to_string()))
}

pub fn is_writable_type(file_type: &str) -> bool {
    WRITABLE_FILE_TYPES.contains(&file_type)
}

/// True when ExifTool can write the file. Any failure counts as not writable.
pub fn file_type_is_writable(program: &Path, path: &Path) -> bool {
    match file_type(program, path) {
        Ok(Some(kind)) => is_writable_type(&kind),
        Ok(None) => false,
        Err(e) => {
            log::error!("file type check failed for {}: {}", path.display(), e);
            false
        }
    }
}

/// Create a sidecar file holding the tags of `image`.
pub fn make_sidecar(program: &Path, image: &Path, sidecar: &Path) -> Result<()> {
    let args = vec!["-tagsfromfile".to_string(), image.display().to_string()];
    run(program, &args, sidecar)?;
    if !sidecar.exists() {
        return Err(GeoTagError::ExifTool(format!(
            "sidecar {} was not created",
            sidecar.display()
        )));
    }
    Ok(())
}

/// Add a user tag, leaving any existing tags in place.
pub fn add_tag(program: &Path, path: &Path, tag: &str) -> Result<()> {
    let args = vec![
        "-q".to_string(),
        "-m".to_string(),
        "-overwrite_original_in_place".to_string(),
        format!("-MDItemUserTags-={}", tag),
        format!("-MDItemUserTags+={}", tag),
    ];
    run(program, &args, path)?;
    Ok(())
}

/// Read date and location tags from an image or XMP sidecar.
pub fn read_metadata(program: &Path, path: &Path) -> Result<ImageMetadata> {
    let mut args = to_args(&["-j", "-n"]);
    args.extend(to_args(&READ_TAGS));
    let output = run(program, &args, path)?;

    let raw_array: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| GeoTagError::ExifTool(format!("Failed to parse exiftool JSON: {}", e)))?;

    // exiftool returns an array; take the first element
    let dump = raw_array
        .as_array()
        .and_then(|a| a.first())
        .cloned()
        .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

    Ok(parse_metadata(&dump))
}

/// Parse fields from a `-j -n` dump.
/// GPS status "V" (void) means the camera had no fix; the GPS values are
/// ignored in that case.
pub fn parse_metadata(dump: &serde_json::Value) -> ImageMetadata {
    let mut meta = ImageMetadata {
        date_time_original: tag_string(dump, "DateTimeOriginal")
            .or_else(|| tag_string(dump, "CreateDate"))
            .map(|d| normalize_exif_date(&d)),
        city: tag_string(dump, "City"),
        state: tag_string(dump, "State"),
        country: tag_string(dump, "Country"),
        country_code: tag_string(dump, "CountryCode"),
        ..Default::default()
    };

    let void = tag_string(dump, "GPSStatus").is_some_and(|s| s == "V" || s.ends_with("Void"));
    if void {
        return meta;
    }

    let latitude = signed_value(
        tag_number(dump, "GPSLatitude"),
        tag_string(dump, "GPSLatitudeRef"),
        'S',
    );
    let longitude = signed_value(
        tag_number(dump, "GPSLongitude"),
        tag_string(dump, "GPSLongitudeRef"),
        'W',
    );
    if let (Some(lat), Some(lon)) = (latitude, longitude) {
        meta.location = Coordinate::validated(lat, lon);
    }

    meta.elevation = tag_number(dump, "GPSAltitude").map(|alt| {
        match tag_number(dump, "GPSAltitudeRef") {
            Some(r) if r == 1.0 => -alt.abs(),
            Some(_) => alt.abs(),
            None => alt,
        }
    });

    meta
}

/// Apply a reference letter to a value. Without a reference the value's own
/// sign is kept.
fn signed_value(value: Option<f64>, reference: Option<String>, negative: char) -> Option<f64> {
    let value = value?;
    Some(match reference {
        Some(r) if r.to_uppercase().starts_with(negative) => -value.abs(),
        Some(_) => value.abs(),
        None => value,
    })
}

/// Drop sub-seconds and any zone suffix, leaving "YYYY:MM:DD HH:MM:SS".
fn normalize_exif_date(date: &str) -> String {
    let whole = date.split('.').next().unwrap_or(date).trim();
    whole.get(..19).unwrap_or(whole).to_string()
}

/// Get a string value from an exiftool dump.
/// Keys may be plain ("GPSStatus") or grouped ("EXIF:GPSStatus").
fn tag_string(dump: &serde_json::Value, tag: &str) -> Option<String> {
    let obj = dump.as_object()?;
    if let Some(val) = obj.get(tag).and_then(value_to_string) {
        return Some(val);
    }
    let suffix = format!(":{}", tag);
    obj.iter()
        .filter(|(key, _)| key.ends_with(&suffix))
        .find_map(|(_, val)| value_to_string(val))
}

/// Get a numeric value from an exiftool dump. Numeric strings are accepted.
fn tag_number(dump: &serde_json::Value, tag: &str) -> Option<f64> {
    let obj = dump.as_object()?;
    let number = |val: &serde_json::Value| {
        val.as_f64()
            .or_else(|| val.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
    };
    if let Some(n) = obj.get(tag).and_then(number) {
        return Some(n);
    }
    let suffix = format!(":{}", tag);
    obj.iter()
        .filter(|(key, _)| key.ends_with(&suffix))
        .find_map(|(_, val)| number(val))
}

/// Convert a JSON value to string (handles both string and numeric values).
fn value_to_string(val: &serde_json::Value) -> Option<String> {
    match val {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageRecord;
    use serde_json::json;
    use std::path::PathBuf;

    fn located_image() -> ImageRecord {
        ImageRecord::from_metadata(
            PathBuf::from("/photos/IMG_0001.jpg"),
            ImageMetadata {
                date_time_original: Some("2023:05:01 10:00:00".to_string()),
                ..Default::default()
            },
        )
    }

    fn request(image: &ImageRecord, sidecar: bool) -> WriteRequest<'_> {
        WriteRequest {
            image,
            target: PathBuf::from("/staging/x/IMG_0001.jpg"),
            target_is_sidecar: sidecar,
            overwrite_in_place: true,
            update_file_modification_time: false,
            gps_timestamp: None,
        }
    }

    #[test]
    fn test_update_args_with_location_below_sea_level() {
        let mut image = located_image();
        image.location = Some(Coordinate::new(37.5, -122.25));
        image.elevation = Some(-12.5);
        image.city = Some("Alviso".to_string());

        let args = update_args(&request(&image, false));
        assert_eq!(
            args,
            vec![
                "-q",
                "-m",
                "-overwrite_original_in_place",
                "-GPSLatitude=37.5",
                "-GPSLatitudeRef=37.5",
                "-GPSLongitude=-122.25",
                "-GPSLongitudeRef=-122.25",
                "-GPSAltitude=12.5",
                "-GPSAltitudeRef=1",
                "-City=Alviso",
                "-State=",
                "-Country=",
                "-CountryCode=",
                "-GPSStatus=",
            ]
        );
    }

    #[test]
    fn test_update_args_without_location_clears_tags() {
        let mut image = located_image();
        image.original_location = Some(Coordinate::new(1.0, 2.0));
        image.location = None;

        let args = update_args(&request(&image, false));
        assert!(args.contains(&"-GPSLatitude=".to_string()));
        assert!(args.contains(&"-GPSAltitude=".to_string()));
        assert!(args.contains(&"-City=".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-GPSStatus="));
    }

    #[test]
    fn test_update_args_gps_time_depends_on_target() {
        let mut image = located_image();
        image.location = Some(Coordinate::new(1.0, 2.0));

        let mut req = request(&image, false);
        req.gps_timestamp = Some("2023:05:01 17:00:00Z".to_string());
        let args = update_args(&req);
        assert!(args.contains(&"-GPSDateStamp=2023:05:01".to_string()));
        assert!(args.contains(&"-GPSTimeStamp=17:00:00Z".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-GPSDateTime=")));

        let mut req = request(&image, true);
        req.gps_timestamp = Some("2023:05:01 17:00:00Z".to_string());
        let args = update_args(&req);
        assert!(args.contains(&"-GPSDateTime=2023:05:01 17:00:00Z".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-GPSDateStamp=")));
    }

    #[test]
    fn test_update_args_changed_timestamp_and_flags() {
        let mut image = located_image();
        image.timestamp = Some("2023:05:01 11:30:00".to_string());

        let mut req = request(&image, false);
        req.overwrite_in_place = false;
        req.update_file_modification_time = true;
        let args = update_args(&req);

        assert!(!args.contains(&"-overwrite_original_in_place".to_string()));
        let modify = args
            .iter()
            .position(|a| a == "-FileModifyDate<DateTimeOriginal")
            .unwrap();
        let original = args
            .iter()
            .position(|a| a == "-DateTimeOriginal=2023:05:01 11:30:00")
            .unwrap();
        assert!(modify < original);
        assert!(args.contains(&"-CreateDate=2023:05:01 11:30:00".to_string()));
    }

    #[test]
    fn test_unchanged_timestamp_is_not_written() {
        let image = located_image();
        let args = update_args(&request(&image, false));
        assert!(!args.iter().any(|a| a.starts_with("-DateTimeOriginal=")));
        assert!(!args.iter().any(|a| a.starts_with("-CreateDate=")));
    }

    #[test]
    fn test_parse_metadata_applies_references() {
        let dump = json!({
            "SourceFile": "/photos/a.jpg",
            "DateTimeOriginal": "2023:05:01 10:00:00",
            "GPSLatitude": 33.5,
            "GPSLatitudeRef": "S",
            "GPSLongitude": 151.25,
            "GPSLongitudeRef": "E",
            "GPSAltitude": 20.0,
            "GPSAltitudeRef": 1,
            "City": "Sydney"
        });
        let meta = parse_metadata(&dump);
        assert_eq!(meta.date_time_original.as_deref(), Some("2023:05:01 10:00:00"));
        assert_eq!(meta.location, Some(Coordinate::new(-33.5, 151.25)));
        assert_eq!(meta.elevation, Some(-20.0));
        assert_eq!(meta.city.as_deref(), Some("Sydney"));
    }

    #[test]
    fn test_parse_metadata_sidecar_style() {
        // XMP values are signed and CreateDate may carry sub-seconds
        let dump = json!({
            "XMP:CreateDate": "2021:12:24 08:15:30.25+01:00",
            "XMP:GPSLatitude": 48.8566,
            "XMP:GPSLongitude": -2.35,
            "XMP:GPSAltitude": "35.5"
        });
        let meta = parse_metadata(&dump);
        assert_eq!(meta.date_time_original.as_deref(), Some("2021:12:24 08:15:30"));
        assert_eq!(meta.location, Some(Coordinate::new(48.8566, -2.35)));
        assert_eq!(meta.elevation, Some(35.5));
    }

    #[test]
    fn test_parse_metadata_void_status_ignores_gps() {
        let dump = json!({
            "GPSStatus": "V",
            "GPSLatitude": 10.0,
            "GPSLatitudeRef": "N",
            "GPSLongitude": 20.0,
            "GPSLongitudeRef": "E"
        });
        let meta = parse_metadata(&dump);
        assert!(meta.location.is_none());
        assert!(meta.elevation.is_none());
    }

    #[test]
    fn test_parse_metadata_rejects_out_of_range_location() {
        let dump = json!({ "GPSLatitude": 123.0, "GPSLongitude": 20.0 });
        assert!(parse_metadata(&dump).location.is_none());
    }

    #[test]
    fn test_writable_types() {
        assert!(is_writable_type("JPEG"));
        assert!(is_writable_type("XMP"));
        assert!(!is_writable_type("AVI"));
        // writable by ExifTool, but the result is unreadable on macOS
        assert!(!is_writable_type("PNG"));
    }

    #[test]
    fn test_missing_program_is_an_exiftool_error() {
        let result = file_type(
            Path::new("/definitely/not/here/exiftool"),
            Path::new("/photos/a.jpg"),
        );
        assert!(matches!(result, Err(GeoTagError::ExifTool(_))));
        assert!(!file_type_is_writable(
            Path::new("/definitely/not/here/exiftool"),
            Path::new("/photos/a.jpg")
        ));
    }
}
