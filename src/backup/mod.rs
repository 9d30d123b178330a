// Backup copies of images and sidecars
//
// Backups land in a user-chosen folder under their original name. When the
// name is taken a "-N" suffix goes before the extension (name-1.jpg,
// name-2.jpg, ...). Names are claimed with create-new so concurrent savers
// never share a destination.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

use crate::constants::MAX_UNIQUE_NAME_ATTEMPTS;
use crate::error::{GeoTagError, Result};
use crate::hash::{compute_full_hash, compute_full_hash_from_bytes};
use crate::sandbox::SidecarPresenter;

/// `name` with "-N" inserted before the last dot (or appended).
pub fn numbered_name(name: &str, number: u32) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}-{}{}", &name[..dot], number, &name[dot..]),
        None => format!("{}-{}", name, number),
    }
}

/// Create a new, empty file in `folder` named after `name`, adding a
/// suffix until an unused name is found.
pub fn claim_backup_path(folder: &Path, name: &str) -> Result<(PathBuf, File)> {
    for attempt in 0..=MAX_UNIQUE_NAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            folder.join(name)
        } else {
            folder.join(numbered_name(name, attempt))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(GeoTagError::Backup(format!(
                    "cannot create {}: {}",
                    candidate.display(),
                    e
                )))
            }
        }
    }
    Err(GeoTagError::Backup(format!(
        "could not find an unused backup name for {}",
        name
    )))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| GeoTagError::InvalidPath(path.display().to_string()))
}

/// Copy `source` (the original file, not a staged link) into the backup
/// folder and verify the copy.
pub fn make_backup_file(source: &Path, folder: &Path, verify_hash: bool) -> Result<PathBuf> {
    let name = file_name(source)?;
    let mut input = File::open(source).map_err(|e| {
        GeoTagError::Backup(format!("cannot open {}: {}", source.display(), e))
    })?;
    let (dest, mut output) = claim_backup_path(folder, &name)?;

    let copied = io::copy(&mut input, &mut output).and_then(|_| output.sync_all());
    drop(output);
    if let Err(e) = copied {
        let _ = fs::remove_file(&dest);
        return Err(GeoTagError::Backup(format!("Image {} copy failed: {}", name, e)));
    }

    // Preserve modification time
    if let Ok(modified) = fs::metadata(source).and_then(|m| m.modified()) {
        let _ = filetime::set_file_mtime(&dest, filetime::FileTime::from_system_time(modified));
    }

    let expected_hash = if verify_hash {
        Some(compute_full_hash(source)?)
    } else {
        None
    };
    let source_size = fs::metadata(source)?.len();
    verify_backup(&dest, source_size, expected_hash.as_deref()).inspect_err(|_| {
        let _ = fs::remove_file(&dest);
    })?;

    log::info!("Backed up {} to {}", source.display(), dest.display());
    Ok(dest)
}

/// Copy a sidecar into the backup folder, reading it under the presenter's
/// shared lock.
pub fn make_sidecar_backup(
    presenter: &SidecarPresenter,
    folder: &Path,
    verify_hash: bool,
) -> Result<PathBuf> {
    let name = file_name(presenter.path())?;
    let data = presenter
        .read_data()
        .map_err(|e| GeoTagError::Backup(format!("Sidecar file {} copy failed: {}", name, e)))?;
    let (dest, mut output) = claim_backup_path(folder, &name)?;

    let written = output.write_all(&data).and_then(|_| output.sync_all());
    drop(output);
    if let Err(e) = written {
        let _ = fs::remove_file(&dest);
        return Err(GeoTagError::Backup(format!("Sidecar file {} copy failed: {}", name, e)));
    }

    let expected_hash = verify_hash.then(|| compute_full_hash_from_bytes(&data));
    verify_backup(&dest, data.len() as u64, expected_hash.as_deref()).inspect_err(|_| {
        let _ = fs::remove_file(&dest);
    })?;

    log::info!("Backed up {} to {}", presenter.path().display(), dest.display());
    Ok(dest)
}

/// A copy can fail without an error being reported; check the result.
fn verify_backup(dest: &Path, expected_size: u64, expected_hash: Option<&str>) -> Result<()> {
    let meta = fs::metadata(dest).map_err(|_| {
        GeoTagError::Backup(format!("backup {} does not exist", dest.display()))
    })?;

    if meta.len() != expected_size {
        return Err(GeoTagError::Backup(format!(
            "Verification failed: size mismatch ({} vs {})",
            expected_size,
            meta.len()
        )));
    }

    if let Some(expected) = expected_hash {
        let actual = compute_full_hash(dest)?;
        if actual != expected {
            return Err(GeoTagError::Backup(format!(
                "Verification failed: hash mismatch for {}",
                dest.display()
            )));
        }
    }
    Ok(())
}

/// Summary of the backup folder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupScan {
    pub folder_size: u64,
    pub old_files: Vec<PathBuf>,
    pub old_size: u64,
}

/// Total the folder and list files placed there more than
/// `retention_days` ago. Hidden files are skipped.
pub fn scan_backup_folder(folder: &Path, retention_days: i64) -> Result<BackupScan> {
    let age = Duration::from_secs(retention_days.max(0) as u64 * 24 * 60 * 60);
    let threshold = SystemTime::now()
        .checked_sub(age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    scan_backup_folder_before(folder, threshold)
}

/// Same as `scan_backup_folder` with an explicit cutoff.
pub fn scan_backup_folder_before(folder: &Path, threshold: SystemTime) -> Result<BackupScan> {
    if !folder.is_dir() {
        return Err(GeoTagError::InvalidPath(folder.display().to_string()));
    }

    let mut scan = BackupScan::default();
    let entries = WalkDir::new(folder)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        scan.folder_size += meta.len();
        if added_time(&meta).is_some_and(|added| added < threshold) {
            scan.old_size += meta.len();
            scan.old_files.push(entry.into_path());
        }
    }

    scan.old_files.sort();
    Ok(scan)
}

/// When the file was placed in its directory. The inode change time is the
/// closest portable stand-in on unix, since copying preserves mtime.
#[cfg(unix)]
fn added_time(meta: &fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    let secs = u64::try_from(meta.ctime()).ok()?;
    let nanos = u32::try_from(meta.ctime_nsec()).unwrap_or(0);
    SystemTime::UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn added_time(meta: &fs::Metadata) -> Option<SystemTime> {
    meta.created().or_else(|_| meta.modified()).ok()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupRemoval {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub freed_bytes: u64,
}

/// Delete the given backups, reporting each outcome.
pub fn remove_backups(paths: &[PathBuf]) -> BackupRemoval {
    let mut outcome = BackupRemoval::default();
    for path in paths {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(path) {
            Ok(()) => {
                outcome.freed_bytes += size;
                outcome.removed.push(path.clone());
            }
            Err(e) => {
                log::warn!("Failed to remove backup {}: {}", path.display(), e);
                outcome.failed.push((path.clone(), e.to_string()));
            }
        }
    }
    outcome
}
