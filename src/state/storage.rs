use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::data::{has_accepted_extension, ImageRef, Slot};
use crate::error::{Result, TryOnError};

/// Legacy directory that mirrors every upload, whichever slot it went to
pub const LEGACY_INPUT_DIR: &str = "input_images";
/// Directory that accumulates one file per successful try-on
pub const OUTPUT_DIR: &str = "output_images";

/// The StorageManager owns the slot directories and the output directory.
///
/// Each slot directory holds at most one file: the slot's current image.
/// The layout is relative to a working directory:
/// - `user_input_image/`    current person image
/// - `garment_input_image/` current garment image
/// - `input_images/`        legacy mirror of every upload (optional)
/// - `output_images/`       composited results, never cleared
#[derive(Debug, Clone)]
pub struct StorageManager {
    root: PathBuf,
    mirror_legacy: bool,
}

impl StorageManager {
    pub fn new(root: impl Into<PathBuf>, mirror_legacy: bool) -> Self {
        Self {
            root: root.into(),
            mirror_legacy,
        }
    }

    pub fn slot_dir(&self, slot: Slot) -> PathBuf {
        self.root.join(slot.dir_name())
    }

    pub fn legacy_dir(&self) -> PathBuf {
        self.root.join(LEGACY_INPUT_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Create every directory the pipeline writes into. Idempotent.
    pub fn ensure_directories(&self) -> Result<()> {
        let mut dirs = vec![
            self.slot_dir(Slot::Person),
            self.slot_dir(Slot::Garment),
            self.output_dir(),
        ];
        if self.mirror_legacy {
            dirs.push(self.legacy_dir());
        }

        for dir in dirs {
            fs::create_dir_all(&dir)
                .map_err(|e| TryOnError::io(format!("Failed to create {}", dir.display()), e))?;
        }

        info!("📁 Storage ready under {}", self.root.display());
        Ok(())
    }

    /// Delete every entry in a slot's directory except `keep`.
    ///
    /// `keep` is the image a running try-on is still reading. An already
    /// empty (or not yet created) directory is success. The first entry
    /// that cannot be removed aborts the clear.
    pub fn clear_slot(&self, slot: Slot, keep: Option<&Path>) -> Result<()> {
        let dir = self.slot_dir(slot);
        if !dir.exists() {
            return Ok(());
        }

        let entries = fs::read_dir(&dir)
            .map_err(|e| TryOnError::io(format!("Failed to list {}", dir.display()), e))?;

        for entry in entries {
            let entry = entry
                .map_err(|e| TryOnError::io(format!("Failed to list {}", dir.display()), e))?;
            let path = entry.path();
            if keep == Some(path.as_path()) {
                debug!("Keeping {} for the running try-on", path.display());
                continue;
            }
            let file_type = entry
                .file_type()
                .map_err(|e| TryOnError::io(format!("Failed to inspect {}", path.display()), e))?;

            let removed = if file_type.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| TryOnError::io(format!("Failed to remove {}", path.display()), e))?;
            debug!("🗑️  Removed {}", path.display());
        }

        Ok(())
    }

    /// Replace a slot's content with a copy of `source`, keeping its file name.
    ///
    /// The source bytes are read before the slot is cleared, so placing the
    /// file that is already stored in the slot works. `keep` survives the
    /// clear (see `clear_slot`).
    pub fn place(&self, slot: Slot, source: &Path, keep: Option<&Path>) -> Result<ImageRef> {
        let file_name = source.file_name().ok_or_else(|| {
            TryOnError::InvalidInput(format!("{} has no file name", source.display()))
        })?;

        let bytes = fs::read(source)
            .map_err(|e| TryOnError::io(format!("Failed to read {}", source.display()), e))?;

        self.clear_slot(slot, keep)?;

        let dir = self.slot_dir(slot);
        fs::create_dir_all(&dir)
            .map_err(|e| TryOnError::io(format!("Failed to create {}", dir.display()), e))?;

        let target = dir.join(file_name);
        fs::write(&target, &bytes)
            .map_err(|e| TryOnError::io(format!("Failed to write {}", target.display()), e))?;

        if self.mirror_legacy {
            let mirror = self.legacy_dir().join(file_name);
            let mirrored = fs::create_dir_all(self.legacy_dir()).and_then(|_| fs::write(&mirror, &bytes));
            if let Err(e) = mirrored {
                warn!("⚠️  Could not mirror upload to {}: {}", mirror.display(), e);
            }
        }

        info!("📥 {} image stored at {} ({} bytes)", slot, target.display(), bytes.len());
        Ok(ImageRef::new(target))
    }

    /// Deterministic output location for a pair of inputs:
    /// `output_images/{person_stem}_{garment_stem}.png`
    pub fn output_path_for(&self, image_a: &Path, image_b: &Path) -> PathBuf {
        let stem = |path: &Path| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        };
        self.output_dir()
            .join(format!("{}_{}.png", stem(image_a), stem(image_b)))
    }

    /// Every image ever uploaded, as mirrored into `input_images/`, sorted
    /// by name. Empty when mirroring is off or nothing was uploaded yet.
    pub fn uploaded_images(&self) -> Result<Vec<PathBuf>> {
        let dir = self.legacy_dir();
        if !self.mirror_legacy || !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir)
            .map_err(|e| TryOnError::io(format!("Failed to list {}", dir.display()), e))?;

        let mut images = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| TryOnError::io(format!("Failed to list {}", dir.display()), e))?
                .path();
            if path.is_file() && has_accepted_extension(&path) {
                images.push(path);
            }
        }
        images.sort();
        Ok(images)
    }

    /// Files currently stored in a slot directory, sorted by name
    #[cfg(test)]
    pub fn slot_entries(&self, slot: Slot) -> Result<Vec<PathBuf>> {
        let dir = self.slot_dir(slot);
        let entries = fs::read_dir(&dir)
            .map_err(|e| TryOnError::io(format!("Failed to list {}", dir.display()), e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| TryOnError::io(format!("Failed to list {}", dir.display()), e))?;
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }
}
