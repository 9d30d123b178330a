// Per-image staging directories
//
// Each save stages an image in its own uniquely named directory holding
// symbolic links to the original image and its sidecar. File content is
// never copied into the stage. The directory (links only) is removed when
// the Sandbox is dropped.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::error::{GeoTagError, Result};
use crate::image::ImageRecord;

/// Process-wide read/write locks keyed by sidecar path.
static SIDECAR_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Coordinated access to one sidecar file.
///
/// Every presenter for the same path shares one lock, so a reader never
/// observes a half-written sidecar. The registry entry goes away with the
/// last presenter for the path.
#[derive(Debug)]
pub struct SidecarPresenter {
    path: PathBuf,
    lock: Arc<RwLock<()>>,
}

impl SidecarPresenter {
    pub fn new(path: &Path) -> Self {
        let mut locks = SIDECAR_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
        let lock = Arc::clone(locks.entry(path.to_path_buf()).or_default());
        Self {
            path: path.to_path_buf(),
            lock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared access for the life of the returned guard.
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Exclusive access for the life of the returned guard.
    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Contents of the sidecar, read under the shared lock.
    pub fn read_data(&self) -> Result<Vec<u8>> {
        let _reading = self.read();
        fs::read(&self.path).map_err(|e| {
            GeoTagError::Sandbox(format!("cannot read sidecar {}: {}", self.path.display(), e))
        })
    }
}

impl Drop for SidecarPresenter {
    fn drop(&mut self) {
        let mut locks = SIDECAR_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
        // registry + this presenter
        if Arc::strong_count(&self.lock) <= 2 {
            locks.remove(&self.path);
        }
    }
}

/// Staging area for saving one image.
#[derive(Debug)]
pub struct Sandbox {
    dir: PathBuf,
    image_path: PathBuf,
    sidecar_path: PathBuf,
    original_sidecar: PathBuf,
    presenter: SidecarPresenter,
}

impl Sandbox {
    /// Create `staging_root/<uuid>/` with a link to the image and, when it
    /// exists, to the image's sidecar.
    pub fn new(image: &ImageRecord, staging_root: &Path) -> Result<Self> {
        let image_name = image
            .path
            .file_name()
            .ok_or_else(|| GeoTagError::InvalidPath(image.path.display().to_string()))?;
        let sidecar_name = image
            .sidecar_path
            .file_name()
            .ok_or_else(|| GeoTagError::InvalidPath(image.sidecar_path.display().to_string()))?;

        let dir = staging_root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&dir).map_err(|e| {
            GeoTagError::Sandbox(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let sandbox = Self {
            image_path: dir.join(image_name),
            sidecar_path: dir.join(sidecar_name),
            original_sidecar: image.sidecar_path.clone(),
            presenter: SidecarPresenter::new(&image.sidecar_path),
            dir,
        };

        // on error the partially built sandbox is dropped and cleaned up
        make_link(&image.path, &sandbox.image_path)?;
        if sandbox.original_sidecar.exists() {
            sandbox.link_sidecar()?;
        }
        Ok(sandbox)
    }

    /// Link a sidecar that was created after staging.
    pub fn link_sidecar(&self) -> Result<()> {
        if fs::symlink_metadata(&self.sidecar_path).is_ok() {
            return Ok(());
        }
        make_link(&self.original_sidecar, &self.sidecar_path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Staged link to the image.
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Staged link to the sidecar. May not exist.
    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    pub fn presenter(&self) -> &SidecarPresenter {
        &self.presenter
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        // remove_dir_all does not follow links, so originals are untouched
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            log::warn!("Failed to remove staging dir {}: {}", self.dir.display(), e);
        }
    }
}

fn make_link(target: &Path, link: &Path) -> Result<()> {
    symlink(target, link).map_err(|e| {
        GeoTagError::Sandbox(format!(
            "cannot link {} to {}: {}",
            link.display(),
            target.display(),
            e
        ))
    })
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
