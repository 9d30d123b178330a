// GeoTag CLI binary

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};

use geotag_lib::backup::{remove_backups, scan_backup_folder};
use geotag_lib::constants::{LATITUDE_REFS, LONGITUDE_REFS};
use geotag_lib::coords::{format_coord, parse_latitude, parse_longitude};
use geotag_lib::image::{discover_images, load_images};
use geotag_lib::save::ProgressFn;
use geotag_lib::{
    adjust_timestamps, interpolate, load_track_logs, locate_from_tracks, save_images, tools,
    CoordFormat, ExifToolWriter, ImageRecord, Settings, TimeAdjustment,
};

#[derive(Parser)]
#[command(name = "geotag")]
#[command(about = "GeoTag - Geotag photos from GPX track logs", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize GPX track logs
    Tracks {
        /// GPX files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Parse a coordinate and show it in every notation
    Coord {
        /// Coordinate text, e.g. "37° 46' 29.7\" N"
        value: String,
        /// Treat the value as a longitude
        #[arg(long)]
        longitude: bool,
    },

    /// Assign locations to images from track logs
    Locate {
        /// Images or folders of images
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// GPX track logs
        #[arg(short, long = "gpx")]
        gpx: Vec<PathBuf>,
        /// Largest gap in seconds between image and track point times
        #[arg(long)]
        tolerance: Option<f64>,
        /// Zone image timestamps were recorded in, e.g. "-07:00"
        #[arg(long, allow_hyphen_values = true)]
        utc_offset: Option<String>,
        /// Shift image timestamps by this many seconds before locating
        #[arg(long, allow_hyphen_values = true)]
        shift: Option<i64>,
        /// Interpolate images between the two located images
        #[arg(long)]
        interpolate: bool,
        /// Write changes back to the files
        #[arg(long)]
        save: bool,
        /// Backup folder for this save
        #[arg(long)]
        backup_folder: Option<PathBuf>,
        /// Skip backups for this save
        #[arg(long)]
        no_backup: bool,
        /// Coordinate notation: deg, degmin or degminsec
        #[arg(long)]
        format: Option<CoordFormat>,
    },

    /// Report and prune old backups
    Backups {
        /// Backup folder (defaults to the configured one)
        #[arg(short, long)]
        folder: Option<PathBuf>,
        /// Retention in days
        #[arg(long)]
        days: Option<i64>,
        /// Delete backups older than the retention period
        #[arg(long)]
        remove: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let settings_path = cli.settings.clone().or_else(Settings::default_path);
    let settings = match &settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Commands::Tracks { files } => cmd_tracks(&files),
        Commands::Coord { value, longitude } => cmd_coord(&value, longitude),
        Commands::Locate {
            paths,
            gpx,
            tolerance,
            utc_offset,
            shift,
            interpolate,
            save,
            backup_folder,
            no_backup,
            format,
        } => {
            let mut settings = settings;
            if let Some(offset) = utc_offset {
                settings.utc_offset_secs = Some(parse_offset(&offset)?.local_minus_utc());
            }
            if let Some(tolerance) = tolerance {
                settings.match_tolerance_secs = tolerance;
            }
            if let Some(folder) = backup_folder {
                settings.backup_folder = Some(folder);
            }
            if no_backup {
                settings.make_backups = false;
            }
            if let Some(format) = format {
                settings.coordinate_format = format;
            }
            cmd_locate(&settings, &paths, &gpx, shift, interpolate, save)
        }
        Commands::Backups { folder, days, remove } => cmd_backups(&settings, folder, days, remove),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn parse_offset(text: &str) -> Result<FixedOffset> {
    text.parse::<FixedOffset>()
        .map_err(|e| anyhow::anyhow!("Invalid UTC offset '{}': {}", text, e))
}

fn format_time(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn cmd_tracks(files: &[PathBuf]) -> Result<()> {
    let report = load_track_logs(files);

    for (path, log) in &report.logs {
        println!("{}", path.display());
        println!("  Tracks:    {}", log.track_count());
        println!("  Segments:  {}", log.segment_count());
        println!("  Points:    {}", log.point_count());
        if let Some((first, last)) = log.time_span() {
            println!("  From:      {}", format_time(first));
            println!("  To:        {}", format_time(last));
        }
    }
    for (path, err) in &report.failed {
        println!("{}: {}", path.display(), err);
    }

    if report.logs.is_empty() {
        anyhow::bail!("No track logs could be loaded");
    }
    Ok(())
}

fn cmd_coord(value: &str, longitude: bool) -> Result<()> {
    let (parsed, refs) = if longitude {
        (parse_longitude(value)?, &LONGITUDE_REFS[..])
    } else {
        (parse_latitude(value)?, &LATITUDE_REFS[..])
    };

    for (label, style) in [
        ("Decimal", CoordFormat::Decimal),
        ("DegMin", CoordFormat::DegMin),
        ("DegMinSec", CoordFormat::DegMinSec),
    ] {
        println!("{:<10} {}", label, format_coord(Some(parsed), style, refs));
    }
    Ok(())
}

fn collect_image_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();
    for path in paths {
        if path.is_dir() {
            images.extend(discover_images(path));
        } else {
            images.push(path.clone());
        }
    }
    images
}

fn print_images(images: &[ImageRecord], format: CoordFormat) {
    println!(
        "{:<32}  {:<20}  {:<22}  {:<22}  {:>8}",
        "Name", "Timestamp", "Latitude", "Longitude", "Elev"
    );
    println!("{}", "-".repeat(112));

    for image in images {
        let marker = if image.changed() { "+" } else { " " };
        let elevation = image
            .elevation
            .map(|e| format!("{:.1}", e))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}{:<31}  {:<20}  {:<22}  {:<22}  {:>8}",
            marker,
            image.name(),
            image.timestamp.as_deref().unwrap_or("-"),
            format_coord(image.location.map(|c| c.latitude), format, &LATITUDE_REFS),
            format_coord(image.location.map(|c| c.longitude), format, &LONGITUDE_REFS),
            elevation,
        );
    }
}

fn cmd_locate(
    settings: &Settings,
    paths: &[PathBuf],
    gpx: &[PathBuf],
    shift: Option<i64>,
    interpolate_between: bool,
    save: bool,
) -> Result<()> {
    if gpx.is_empty() && shift.is_none() && !interpolate_between {
        anyhow::bail!("Nothing to do: give --gpx track logs, --shift or --interpolate");
    }
    let adjustment = match shift {
        Some(secs) => Some(
            TimeAdjustment::by_seconds(secs)
                .ok_or_else(|| anyhow::anyhow!("Shift of {} seconds is out of range", secs))?,
        ),
        None => None,
    };

    let program = tools::exiftool_path();
    if !tools::is_exiftool_available() {
        anyhow::bail!(
            "ExifTool not found (tried {}); set GEOTAG_EXIFTOOL_PATH",
            program.display()
        );
    }

    let image_paths = collect_image_paths(paths);
    if image_paths.is_empty() {
        anyhow::bail!("No images found");
    }
    let mut images = load_images(&image_paths, &program);
    println!("Loaded {} images", images.len());

    if let Some(adjustment) = &adjustment {
        let changes = adjust_timestamps(&mut images, adjustment, settings.time_zone());
        println!("Shifted {} image timestamps", changes.len());
    }

    if !gpx.is_empty() {
        let report = load_track_logs(gpx);
        for (path, err) in &report.failed {
            println!("Skipping {}: {}", path.display(), err);
        }
        let logs: Vec<_> = report.logs.into_iter().map(|(_, log)| log).collect();
        let changes = locate_from_tracks(&mut images, &logs, &settings.locate_options());
        println!("Located {} images from {} track logs", changes.len(), logs.len());
    }

    if interpolate_between {
        let changes = interpolate(&mut images, settings.time_zone())?;
        println!("Interpolated {} images", changes.len());
    }

    println!();
    print_images(&images, settings.coordinate_format);

    if save {
        save_changes(settings, &mut images, &program)?;
    }
    Ok(())
}

fn save_changes(settings: &Settings, images: &mut [ImageRecord], program: &Path) -> Result<()> {
    let writer = ExifToolWriter::with_program(program);
    let options = settings.save_options();
    let cancel = AtomicBool::new(false);
    let report: ProgressFn<'_> = &|p| {
        if let (Some(path), Some(err)) = (&p.path, &p.error_message) {
            log::warn!("[{}/{}] {}: {}", p.current, p.total, path.display(), err);
        } else {
            log::info!("[{}/{}] {:.0}%", p.current, p.total, p.percent);
        }
    };

    let issues = save_images(images, &options, &writer, &cancel, Some(report))?;

    println!();
    if issues.is_empty() {
        println!("All changes saved");
        return Ok(());
    }
    println!("{} images could not be saved:", issues.len());
    let mut failed: Vec<_> = issues.iter().collect();
    failed.sort();
    for (path, msg) in failed {
        println!("  {}: {}", path.display(), msg);
    }
    anyhow::bail!("Save finished with errors")
}

fn cmd_backups(
    settings: &Settings,
    folder: Option<PathBuf>,
    days: Option<i64>,
    remove: bool,
) -> Result<()> {
    let folder = folder
        .or_else(|| settings.backup_folder.clone())
        .ok_or_else(|| anyhow::anyhow!("No backup folder configured; use --folder"))?;
    let days = days.unwrap_or(settings.backup_retention_days);

    let scan = scan_backup_folder(&folder, days)?;
    println!("Backup folder: {}", folder.display());
    println!("  Total size:          {}", format_bytes(scan.folder_size));
    println!(
        "  Older than {} days:  {} files, {}",
        days,
        scan.old_files.len(),
        format_bytes(scan.old_size)
    );

    if remove && !scan.old_files.is_empty() {
        let removal = remove_backups(&scan.old_files);
        println!(
            "Removed {} files, freed {}",
            removal.removed.len(),
            format_bytes(removal.freed_bytes)
        );
        for (path, err) in &removal.failed {
            println!("  Failed {}: {}", path.display(), err);
        }
    }
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
