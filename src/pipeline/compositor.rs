/// The external compositor: an opaque program that blends a person image
/// and a garment image into a single output file.
///
/// Invocation contract: `program [args...] <person> <garment> <output>`,
/// exit status 0 means success.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::ToolFailure;

/// Runs the compositor as a separate process
#[derive(Debug, Clone)]
pub struct ProcessCompositor {
    program: PathBuf,
    /// Arguments placed before the three image paths (e.g. the script name)
    leading_args: Vec<String>,
    timeout: Option<Duration>,
    working_dir: Option<PathBuf>,
}

impl ProcessCompositor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout: None,
            working_dir: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command(&self, person: &Path, garment: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg(person)
            .arg(garment)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout kills the tool
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run the tool and wait until the composite at `output` is written
    /// or the attempt failed
    pub async fn composite(&self, person: &Path, garment: &Path, output: &Path) -> Result<(), ToolFailure> {
        log::info!(
            "🧵 Running {} {:?} {} {} {}",
            self.program.display(),
            self.leading_args,
            person.display(),
            garment.display(),
            output.display()
        );

        let child = self
            .command(person, garment, output)
            .spawn()
            .map_err(|e| ToolFailure::Launch(format!("{}: {}", self.program.display(), e)))?;

        let finished = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(finished) => finished,
                Err(_) => {
                    log::error!("⏱️  Compositor killed after {}s", timeout.as_secs());
                    return Err(ToolFailure::TimedOut(timeout.as_secs()));
                }
            },
            None => child.wait_with_output().await,
        };
        let done = finished.map_err(|e| ToolFailure::Launch(format!("failed to wait for compositor: {}", e)))?;

        let stdout = String::from_utf8_lossy(&done.stdout);
        if !stdout.trim().is_empty() {
            log::debug!("compositor stdout: {}", stdout.trim());
        }

        if done.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&done.stderr).trim().to_string();
            log::error!("❌ Compositor failed ({:?}): {}", done.status.code(), stderr);
            Err(ToolFailure::Exit {
                code: done.status.code(),
                stderr,
            })
        }
    }
}
