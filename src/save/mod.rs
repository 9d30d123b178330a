// Save pipeline
//
// Changed images are written by a bounded pool of scoped worker threads.
// Each image is staged, optionally given a sidecar, optionally backed up,
// written through ExifTool and optionally tagged. A failure (or panic) in
// one image becomes that image's entry in the returned issues map and
// never affects another image.

pub mod progress;


use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use chrono::FixedOffset;

use crate::backup::{make_backup_file, make_sidecar_backup};
use crate::constants::{DEFAULT_TAG_NAME, STAGING_FOLDER};
use crate::error::{GeoTagError, Result};
use crate::image::ImageRecord;
use crate::metadata::{MetadataWriter, WriteRequest};
use crate::sandbox::Sandbox;

pub use progress::SaveProgress;

/// Failure message per image path. Absence means saved or nothing to do.
pub type SaveIssues = HashMap<PathBuf, String>;

/// Progress callback shared by all workers.
pub type ProgressFn<'a> = &'a (dyn Fn(&SaveProgress) + Sync);

pub const CANCELLED_MESSAGE: &str = "save cancelled";

#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub make_backups: bool,
    pub backup_folder: Option<PathBuf>,
    /// Compare BLAKE3 hashes of backup and source, not only sizes
    pub verify_backups: bool,
    pub create_sidecars: bool,
    /// User tag added to each saved file; no tagging when `None`
    pub tag_name: Option<String>,
    pub update_file_modification_times: bool,
    pub update_gps_timestamps: bool,
    pub time_zone: Option<FixedOffset>,
    pub staging_root: PathBuf,
    pub max_workers: usize,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            make_backups: true,
            backup_folder: None,
            verify_backups: false,
            create_sidecars: false,
            tag_name: None,
            update_file_modification_times: false,
            update_gps_timestamps: false,
            time_zone: None,
            staging_root: default_staging_root(),
            max_workers: default_max_workers(),
        }
    }
}

pub fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join("geotag").join(STAGING_FOLDER)
}

pub fn default_max_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Check if the save has been cancelled
pub fn is_cancelled(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Relaxed)
}

/// Write every changed image that is not a library asset.
///
/// Returns `Err` only when nothing was attempted: backups are enabled but
/// the backup folder is missing. Per-image failures are in the returned map.
/// Images that saved have their original values advanced to the current
/// ones; failed images are left changed.
pub fn save_images(
    images: &mut [ImageRecord],
    options: &SaveOptions,
    writer: &dyn MetadataWriter,
    cancel: &AtomicBool,
    progress: Option<ProgressFn<'_>>,
) -> Result<SaveIssues> {
    let eligible: Vec<usize> = images
        .iter()
        .enumerate()
        .filter(|(_, image)| image.changed() && !image.library_asset)
        .map(|(index, _)| index)
        .collect();

    if eligible.is_empty() {
        log::debug!("No changed images to save");
        return Ok(SaveIssues::new());
    }

    let backup_folder = if options.make_backups {
        match options.backup_folder.as_deref() {
            Some(folder) if folder.is_dir() => Some(folder),
            _ => return Err(GeoTagError::NoBackupFolder),
        }
    } else {
        None
    };

    let total = eligible.len();
    let workers = options.max_workers.clamp(1, total);
    log::info!("Saving {} images with {} workers", total, workers);

    let next = AtomicUsize::new(0);
    let finished = AtomicUsize::new(0);
    let shared: &[ImageRecord] = images;

    let outcomes: Vec<(usize, std::result::Result<(), String>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut done = Vec::new();
                    while !is_cancelled(cancel) {
                        let slot = next.fetch_add(1, Ordering::SeqCst);
                        let Some(&index) = eligible.get(slot) else {
                            break;
                        };
                        let image = &shared[index];
                        let outcome = save_isolated(image, options, backup_folder, writer);

                        let current = finished.fetch_add(1, Ordering::SeqCst) + 1;
                        if let Some(report) = progress {
                            let mut update =
                                SaveProgress::new("saving", current as u64, total as u64)
                                    .with_path(&image.path);
                            if let Err(msg) = &outcome {
                                update = update.error(msg.clone());
                            }
                            report(&update);
                        }
                        done.push((index, outcome));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_default())
            .collect()
    });

    let mut issues = SaveIssues::new();
    let mut attempted = vec![false; images.len()];
    for (index, outcome) in outcomes {
        attempted[index] = true;
        let image = &mut images[index];
        if !image.sidecar_exists && image.sidecar_path.is_file() {
            image.sidecar_exists = true;
        }
        match outcome {
            Ok(()) => image.mark_saved(),
            Err(msg) => {
                log::error!("Save failed for {}: {}", image.path.display(), msg);
                issues.insert(image.id().to_path_buf(), msg);
            }
        }
    }

    let mut skipped = 0;
    for &index in &eligible {
        if !attempted[index] {
            issues.insert(images[index].id().to_path_buf(), CANCELLED_MESSAGE.to_string());
            skipped += 1;
        }
    }
    if skipped > 0 {
        log::warn!("Save cancelled, {} images not started", skipped);
        if let Some(report) = progress {
            let done = finished.load(Ordering::SeqCst) as u64;
            report(&SaveProgress::new("cancelled", done, total as u64).cancelled());
        }
    }

    log::info!("Saved {} of {} images", total - issues.len(), total);
    Ok(issues)
}

/// Run one image's save, turning errors and panics into a message.
fn save_isolated(
    image: &ImageRecord,
    options: &SaveOptions,
    backup_folder: Option<&Path>,
    writer: &dyn MetadataWriter,
) -> std::result::Result<(), String> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        save_image(image, options, backup_folder, writer)
    }));
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("save panicked: {}", detail),
        None => "save panicked".to_string(),
    }
}

fn save_image(
    image: &ImageRecord,
    options: &SaveOptions,
    backup_folder: Option<&Path>,
    writer: &dyn MetadataWriter,
) -> Result<()> {
    let sandbox = Sandbox::new(image, &options.staging_root)?;
    let mut use_sidecar = image.sidecar_exists;

    if options.create_sidecars && !image.sidecar_exists {
        {
            let _writing = sandbox.presenter().write();
            writer.make_sidecar(&image.path, &image.sidecar_path)?;
        }
        sandbox.link_sidecar()?;
        use_sidecar = true;
    }

    let backup_made = match backup_folder {
        Some(folder) => {
            if use_sidecar {
                make_sidecar_backup(sandbox.presenter(), folder, options.verify_backups)?;
            } else {
                make_backup_file(&image.path, folder, options.verify_backups)?;
            }
            true
        }
        None => false,
    };

    let target = if use_sidecar {
        sandbox.sidecar_path()
    } else {
        sandbox.image_path()
    };
    let request = WriteRequest {
        image,
        target: target.to_path_buf(),
        target_is_sidecar: use_sidecar,
        overwrite_in_place: !options.make_backups || backup_made,
        update_file_modification_time: options.update_file_modification_times,
        gps_timestamp: if options.update_gps_timestamps {
            image.gps_timestamp(options.time_zone)
        } else {
            None
        },
    };

    if use_sidecar {
        let _writing = sandbox.presenter().write();
        writer.write(&request)?;
    } else {
        writer.write(&request)?;
    }

    if let Some(tag) = options.tag_name.as_deref() {
        let tag = if tag.trim().is_empty() {
            DEFAULT_TAG_NAME
        } else {
            tag
        };
        writer.add_tag(&image.path, tag)?;
    }

    log::debug!("Saved {}", image.path.display());
    Ok(())
}
