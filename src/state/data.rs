/// Shared data structures for the application state
///
/// These types flow between the storage layer, the try-on pipeline
/// and the UI layer.

use std::fmt;
use std::path::{Path, PathBuf};

/// File extensions accepted by the upload picker and the upload pipeline
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Case-insensitive check of a path's extension against `ACCEPTED_EXTENSIONS`
pub fn has_accepted_extension(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy().to_lowercase();
            ACCEPTED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// One of the two fixed upload roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The user's own photo (button 1)
    Person,
    /// The garment to try on (button 2)
    Garment,
}

impl Slot {
    /// Name of the directory that holds this slot's current image
    pub fn dir_name(&self) -> &'static str {
        match self {
            Slot::Person => "user_input_image",
            Slot::Garment => "garment_input_image",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Slot::Person => "Person",
            Slot::Garment => "Garment",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A stored image, identified by its path inside the storage directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    path: PathBuf,
}

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Filename only (e.g., "person.png")
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Observable state of the processing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Fewer than two images loaded
    Idle,
    /// Both images loaded, nothing has run since the last upload
    Ready,
    Running,
    Succeeded,
    Failed,
}

impl RunState {
    /// Whether a new `run()` would be accepted
    pub fn can_run(&self) -> bool {
        matches!(self, Self::Ready | Self::Succeeded | Self::Failed)
    }
}

/// Result of the most recent finished run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded(ImageRef),
    /// Diagnostic text captured from the compositor
    Failed(String),
}
