/// Error taxonomy for uploads, runs, configuration and the history catalog
use std::path::PathBuf;
use thiserror::Error;

/// Why the external compositor did not produce an image
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolFailure {
    /// The process could not be started at all
    #[error("failed to launch compositor: {0}")]
    Launch(String),

    /// Exited with a non-zero status (`code` is None when killed by a signal)
    #[error("compositor exited with {}: {stderr}", describe_code(.code))]
    Exit { code: Option<i32>, stderr: String },

    /// Reported success but left no (or an empty) file behind
    #[error("compositor reported success but {} is missing or empty", .0.display())]
    OutputMissing(PathBuf),

    #[error("compositor did not finish within {0}s and was killed")]
    TimedOut(u64),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

#[derive(Error, Debug)]
pub enum TryOnError {
    /// Selected file is missing, unreadable or not an accepted image type
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// `run()` before both slots were filled
    #[error("{0}")]
    Precondition(String),

    #[error("a try-on is already running, wait for it to finish")]
    Busy,

    #[error(transparent)]
    ExternalTool(#[from] ToolFailure),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("history database error: {0}")]
    History(#[from] rusqlite::Error),
}

impl TryOnError {
    /// Wrap an I/O error with a short description of what was being done
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TryOnError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TryOnError>;
