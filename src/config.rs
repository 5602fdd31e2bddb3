use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TryOnError};
use crate::pipeline::ProcessCompositor;

/// Application settings, read from `config.json`.
/// Every field has a default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory the slot/output folders live in
    pub workdir: PathBuf,
    /// Also copy every upload into the legacy `input_images/` folder
    pub mirror_legacy_input: bool,
    pub compositor: CompositorConfig,
    /// Where the try-on history lives; defaults to the user data directory
    pub history_db: Option<PathBuf>,
    /// Avatar measurements table shown in the Avatars tab
    pub avatars_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Program to execute (e.g. "python" or a path to a binary)
    pub program: PathBuf,
    /// Arguments placed before the three image paths
    pub args: Vec<String>,
    /// Kill the compositor after this many seconds; None waits forever
    pub timeout_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            mirror_legacy_input: true,
            compositor: CompositorConfig::default(),
            history_db: None,
            avatars_csv: None,
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python"),
            args: vec!["process_images.py".to_string()],
            timeout_secs: None,
        }
    }
}

impl AppConfig {
    pub const DEFAULT_PATH: &'static str = "config.json";

    /// Load settings from `path`. A missing file means defaults;
    /// a file that exists but doesn't parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No {} found, using default settings", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| TryOnError::io(format!("Failed to read {}", path.display()), e))?;
        let config = serde_json::from_str::<AppConfig>(&content)
            .map_err(|e| TryOnError::Config(format!("{}: {}", path.display(), e)))?;

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| TryOnError::Config(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| TryOnError::io(format!("Failed to write {}", path.display()), e))
    }

    /// Build the process compositor described by these settings.
    /// The compositor runs inside the working directory.
    pub fn compositor(&self) -> ProcessCompositor {
        ProcessCompositor::new(&self.compositor.program)
            .with_args(self.compositor.args.clone())
            .with_timeout(self.compositor.timeout_secs.map(Duration::from_secs))
            .with_working_dir(&self.workdir)
    }
}
