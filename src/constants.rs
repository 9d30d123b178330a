// GeoTag Constants
// Policy values marked "arbitrary" are defaults only; Settings can override them.

// Track matching
/// Maximum gap between an image timestamp and the matched track point.
/// Six hours is arbitrary.
pub const DEFAULT_MATCH_TOLERANCE_SECS: f64 = 21_600.0;

// Geodesy
pub const EARTH_RADIUS_M: f64 = 6_372_800.0;

// Coordinates
pub const LATITUDE_REFS: [&str; 2] = ["N", "S"];
pub const LONGITUDE_REFS: [&str; 2] = ["E", "W"];
pub const MAX_LATITUDE: u32 = 90;
pub const MAX_LONGITUDE: u32 = 180;

// Image timestamps, as written and read by ExifTool
pub const IMAGE_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
pub const GPS_TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%SZ";

// Sidecars
pub const XMP_EXTENSION: &str = "xmp";

// Tags
pub const DEFAULT_TAG_NAME: &str = "GeoTag";

// Backups
/// Backups older than this are offered for removal. Seven days is arbitrary.
pub const BACKUP_RETENTION_DAYS: i64 = 7;
pub const MAX_UNIQUE_NAME_ATTEMPTS: u32 = 10_000;
pub const HASH_CHUNK_SIZE: usize = 1024 * 1024; // 1MB
pub const TEMP_FILE_PREFIX: &str = ".geotag_tmp_";

// Paths
pub const STAGING_FOLDER: &str = "staging";
pub const SETTINGS_FILENAME: &str = "settings.json";

// Image extensions considered when a folder is opened
pub const IMAGE_EXTENSIONS: [&str; 22] = [
    "jpg", "jpeg", "png", "gif", "tif", "tiff", "heic", "heif", "dng",
    "cr2", "cr3", "crw", "nef", "nrw", "arw", "orf", "raf", "rw2",
    "pef", "srw", "x3f", "avif",
];

// File Type codes ExifTool can write (matches ExifTool 12.30, minus PNG:
// macOS can't read metadata ExifTool writes into PNG files)
pub const WRITABLE_FILE_TYPES: [&str; 72] = [
    "360", "3G2", "3GP", "AAX", "AI", "ARQ", "ARW", "AVIF", "CR2", "CR3",
    "CRM", "CRW", "CS1", "DCP", "DNG", "DR4", "DVB", "EPS", "ERF", "EXIF",
    "EXV", "F4A/V", "FFF", "FLIF", "GIF", "GPR", "HDP", "HEIC", "HEIF",
    "ICC", "IIQ", "IND", "INSP", "JNG", "JP2", "JPEG", "LRV", "M4A/V",
    "MEF", "MIE", "MNG", "MOS", "MOV", "MP4", "MPO", "MQV", "MRW",
    "NEF", "NRW", "ORF", "ORI", "PBM", "PDF", "PEF", "PGM",
    "PPM", "PS", "PSB", "PSD", "QTIF", "RAF", "RAW", "RW2",
    "RWL", "SR2", "SRW", "THM", "TIFF", "VRD", "WDP", "X3F", "XMP",
];
