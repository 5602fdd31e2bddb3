use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::compositor::ProcessCompositor;
use crate::error::{Result, ToolFailure, TryOnError};
use crate::state::data::{ImageRef, Slot};
use crate::state::session::{Session, SharedSession};
use crate::state::storage::StorageManager;

/// What a finished run used and produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub person: ImageRef,
    pub garment: ImageRef,
    pub output: ImageRef,
}

/// Single-flight runner of the external compositor.
///
/// `run()` moves the Session through Ready -> Running -> Succeeded/Failed.
/// Only one run can be in flight per Session; a second call while one is
/// running fails with `Busy`. Identical inputs are never deduplicated.
#[derive(Debug, Clone)]
pub struct ProcessingInvoker {
    session: SharedSession,
    storage: Arc<StorageManager>,
    compositor: ProcessCompositor,
}

impl ProcessingInvoker {
    pub fn new(session: SharedSession, storage: Arc<StorageManager>, compositor: ProcessCompositor) -> Self {
        Self {
            session,
            storage,
            compositor,
        }
    }

    /// Run the compositor on the current images and wait for it to exit
    pub async fn run(&self) -> Result<RunReport> {
        // Check-and-set under one lock so two callers can't both start
        let (person, garment) = self.session.lock().begin_run()?;

        let output_path = self.storage.output_path_for(person.path(), garment.path());
        log::info!(
            "🚀 Try-on started: {} + {} -> {}",
            person.file_name(),
            garment.file_name(),
            output_path.display()
        );

        let result = self.produce(&person, &garment, &output_path).await;

        {
            let mut session = self.session.lock();
            session.finish_run(&result);
            self.discard_stale_inputs(&session);
        }

        match &result {
            Ok(output) => log::info!("✅ Try-on complete: {}", output),
            Err(e) => log::error!("❌ Try-on failed: {}", e),
        }

        result.map(|output| RunReport {
            person,
            garment,
            output,
        })
    }

    async fn produce(&self, person: &ImageRef, garment: &ImageRef, output_path: &Path) -> Result<ImageRef> {
        let previous = set_aside_previous_output(output_path)?;

        let result = self
            .compositor
            .composite(person.path(), garment.path(), output_path)
            .await
            .and_then(|_| verify_output(output_path))
            .map(|_| ImageRef::new(output_path))
            .map_err(TryOnError::from);

        if let Some(previous) = previous {
            settle_previous_output(&previous, output_path, result.is_ok());
        }
        result
    }

    /// Uploads made during the run left the captured images behind;
    /// only each slot's current image stays
    fn discard_stale_inputs(&self, session: &Session) {
        for slot in [Slot::Person, Slot::Garment] {
            let Some(current) = session.image(slot) else {
                continue;
            };
            if let Err(e) = self.storage.clear_slot(slot, Some(current.path())) {
                log::warn!("⚠️  Could not tidy the {} slot: {}", slot, e);
            }
        }
    }
}

/// Move an earlier result for the same inputs out of the way, so the
/// output check only ever sees a file this run wrote
fn set_aside_previous_output(output_path: &Path) -> Result<Option<PathBuf>> {
    if !output_path.exists() {
        return Ok(None);
    }
    let previous = output_path.with_extension("png.previous");
    fs::rename(output_path, &previous)
        .map_err(|e| TryOnError::io(format!("Failed to set aside {}", output_path.display()), e))?;
    Ok(Some(previous))
}

/// Drop the earlier result after a success, put it back after a failure
fn settle_previous_output(previous: &Path, output_path: &Path, succeeded: bool) {
    let settled = if succeeded {
        fs::remove_file(previous)
    } else {
        fs::rename(previous, output_path)
    };
    if let Err(e) = settled {
        log::warn!("⚠️  Could not settle {}: {}", previous.display(), e);
    }
}

/// A success exit code is only trusted if the output file is really there
fn verify_output(path: &Path) -> std::result::Result<(), ToolFailure> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(ToolFailure::OutputMissing(path.to_path_buf())),
    }
}

/// Owned entry point for the GUI: the compositor process is awaited on
/// the runtime, so the UI thread keeps rendering while it works
pub async fn run_in_background(invoker: ProcessingInvoker) -> Result<RunReport> {
    invoker.run().await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::pipeline::upload::UploadPipeline;
    use crate::state::data::RunState;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        storage: Arc<StorageManager>,
        session: SharedSession,
        uploads: UploadPipeline,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().expect("create temp dir");
            let storage = Arc::new(StorageManager::new(tmp.path().join("work"), true));
            storage.ensure_directories().unwrap();
            let session = SharedSession::new();
            let uploads = UploadPipeline::new(storage.clone(), session.clone());
            Self {
                tmp,
                storage,
                session,
                uploads,
            }
        }

        fn image(&self, name: &str, content: &[u8]) -> PathBuf {
            let path = self.tmp.path().join(name);
            fs::write(&path, content).unwrap();
            path
        }

        fn load_both(&self) {
            self.uploads
                .upload(Slot::Person, &self.image("person.png", b"person-bytes"))
                .unwrap();
            self.uploads
                .upload(Slot::Garment, &self.image("shirt.jpg", b"shirt-bytes"))
                .unwrap();
        }

        /// Write a stub compositor script; it is run through `sh`
        fn stub(&self, name: &str, body: &str) -> PathBuf {
            let path = self.tmp.path().join(name);
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            path
        }

        fn invoker(&self, script: PathBuf) -> ProcessingInvoker {
            let compositor = ProcessCompositor::new("sh")
                .with_args(vec![script.to_string_lossy().to_string()]);
            ProcessingInvoker::new(self.session.clone(), self.storage.clone(), compositor)
        }

        fn calls_log(&self) -> PathBuf {
            self.tmp.path().join("calls.log")
        }

        fn calls(&self) -> usize {
            fs::read_to_string(self.calls_log())
                .map(|s| s.lines().count())
                .unwrap_or(0)
        }

        fn outputs(&self) -> usize {
            fs::read_dir(self.storage.output_dir()).unwrap().count()
        }

        async fn wait_until_running(&self) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while self.session.state() != RunState::Running {
                assert!(Instant::now() < deadline, "first run never started");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    #[tokio::test]
    async fn test_run_without_person_is_precondition_error() {
        let fx = Fixture::new();
        fx.uploads
            .upload(Slot::Garment, &fx.image("shirt.jpg", b"s"))
            .unwrap();
        let stub = fx.stub("copy.sh", &format!("echo run >> '{}'; cp \"$1\" \"$3\"", fx.calls_log().display()));

        let err = fx.invoker(stub).run().await.unwrap_err();

        assert!(matches!(err, TryOnError::Precondition(_)));
        assert_eq!(fx.calls(), 0);
        assert!(fx.storage.slot_entries(Slot::Person).unwrap().is_empty());
        assert_eq!(fx.outputs(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_success() {
        let fx = Fixture::new();
        fx.load_both();
        let stub = fx.stub("copy.sh", r#"cp "$1" "$3""#);

        let report = fx.invoker(stub).run().await.unwrap();

        let expected = fx.storage.output_dir().join("person_shirt.png");
        assert_eq!(report.output.path(), expected.as_path());
        assert_eq!(report.person.file_name(), "person.png");
        assert_eq!(fs::read(&expected).unwrap(), b"person-bytes");

        let session = fx.session.lock();
        assert_eq!(session.state(), RunState::Succeeded);
        assert_eq!(session.output_image(), Some(&report.output));
    }

    #[tokio::test]
    async fn test_end_to_end_failure() {
        let fx = Fixture::new();
        fx.load_both();
        let stub = fx.stub("fail.sh", "echo 'cannot find garment mask' >&2; exit 1");

        let err = fx.invoker(stub).run().await.unwrap_err();
        assert!(matches!(
            err,
            TryOnError::ExternalTool(ToolFailure::Exit { code: Some(1), .. })
        ));

        let session = fx.session.lock();
        assert_eq!(session.state(), RunState::Failed);
        assert!(session.output_image().is_none());
        assert!(session.last_error().unwrap().contains("cannot find garment mask"));
        assert_eq!(session.person_image().unwrap().file_name(), "person.png");
        assert_eq!(session.garment_image().unwrap().file_name(), "shirt.jpg");
    }

    #[tokio::test]
    async fn test_success_without_output_is_output_missing() {
        let fx = Fixture::new();
        fx.load_both();
        let stub = fx.stub("noop.sh", "exit 0");

        let err = fx.invoker(stub).run().await.unwrap_err();
        assert!(matches!(err, TryOnError::ExternalTool(ToolFailure::OutputMissing(_))));
        assert!(fx.session.lock().output_image().is_none());
        assert_eq!(fx.session.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_empty_output_is_output_missing() {
        let fx = Fixture::new();
        fx.load_both();
        let stub = fx.stub("empty.sh", r#": > "$3""#);

        let err = fx.invoker(stub).run().await.unwrap_err();
        assert!(matches!(err, TryOnError::ExternalTool(ToolFailure::OutputMissing(_))));
    }

    #[tokio::test]
    async fn test_rerun_without_output_ignores_earlier_result() {
        let fx = Fixture::new();
        fx.load_both();
        let good = fx.invoker(fx.stub("copy.sh", r#"cp "$1" "$3""#));
        let silent = fx.invoker(fx.stub("noop.sh", "exit 0"));

        let first = good.run().await.unwrap();
        let err = silent.run().await.unwrap_err();

        assert!(matches!(err, TryOnError::ExternalTool(ToolFailure::OutputMissing(_))));
        assert_eq!(fx.session.state(), RunState::Failed);
        // The earlier result is back in place and still the last output
        assert_eq!(fs::read(first.output.path()).unwrap(), b"person-bytes");
        assert_eq!(fx.session.lock().output_image(), Some(&first.output));
        assert_eq!(fx.outputs(), 1);
    }

    #[tokio::test]
    async fn test_rerun_invokes_again_and_overwrites() {
        let fx = Fixture::new();
        fx.load_both();
        let stub = fx.stub(
            "count.sh",
            &format!(
                "echo run >> '{log}'; wc -l < '{log}' > \"$3\"",
                log = fx.calls_log().display()
            ),
        );
        let invoker = fx.invoker(stub);

        let first = invoker.run().await.unwrap();
        let first_content = fs::read_to_string(first.output.path()).unwrap();
        let second = invoker.run().await.unwrap();
        let second_content = fs::read_to_string(second.output.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.calls(), 2);
        assert_ne!(first_content, second_content);
        assert_eq!(fx.outputs(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_busy() {
        let fx = Fixture::new();
        fx.load_both();
        let stub = fx.stub(
            "slow.sh",
            &format!("echo run >> '{}'; sleep 1; cp \"$1\" \"$3\"", fx.calls_log().display()),
        );
        let invoker = fx.invoker(stub);

        let background = {
            let invoker = invoker.clone();
            tokio::spawn(async move { invoker.run().await })
        };
        fx.wait_until_running().await;

        assert!(matches!(invoker.run().await, Err(TryOnError::Busy)));

        let report = background.await.unwrap().unwrap();
        assert!(report.output.path().is_file());
        assert_eq!(fx.calls(), 1);
        assert_eq!(fx.outputs(), 1);
    }

    #[tokio::test]
    async fn test_inflight_run_uses_captured_images() {
        let fx = Fixture::new();
        fx.load_both();
        let stub = fx.stub("slow.sh", r#"sleep 1; cat "$1" "$2" > "$3""#);
        let invoker = fx.invoker(stub);

        let background = {
            let invoker = invoker.clone();
            tokio::spawn(async move { invoker.run().await })
        };
        fx.wait_until_running().await;

        // Swap the garment while the compositor is busy
        let dress = fx
            .uploads
            .upload(Slot::Garment, &fx.image("dress.png", b"dress"))
            .unwrap();

        let report = background.await.unwrap().unwrap();
        assert_eq!(report.garment.file_name(), "shirt.jpg");
        assert_eq!(report.output.path().file_name().unwrap(), "person_shirt.png");
        assert_eq!(fs::read(report.output.path()).unwrap(), b"person-bytesshirt-bytes");

        // The next run sees the new garment, and it is the only one left
        assert_eq!(fx.session.lock().garment_image(), Some(&dress));
        assert_eq!(
            fx.storage.slot_entries(Slot::Garment).unwrap(),
            vec![dress.path().to_path_buf()]
        );
    }

    #[tokio::test]
    async fn test_timeout_returns_to_runnable() {
        let fx = Fixture::new();
        fx.load_both();
        let script = fx.stub("hang.sh", "exec sleep 5");
        let compositor = ProcessCompositor::new("sh")
            .with_args(vec![script.to_string_lossy().to_string()])
            .with_timeout(Some(Duration::from_millis(200)));
        let invoker = ProcessingInvoker::new(fx.session.clone(), fx.storage.clone(), compositor);

        let err = invoker.run().await.unwrap_err();
        assert!(matches!(err, TryOnError::ExternalTool(ToolFailure::TimedOut(_))));
        assert_eq!(fx.session.state(), RunState::Failed);
        assert!(fx.session.state().can_run());
    }

    #[tokio::test]
    async fn test_run_in_background() {
        let fx = Fixture::new();
        fx.load_both();
        let stub = fx.stub("garment.sh", r#"cp "$2" "$3""#);

        let report = run_in_background(fx.invoker(stub)).await.unwrap();
        assert_eq!(fs::read(report.output.path()).unwrap(), b"shirt-bytes");
        assert_eq!(report.person.file_name(), "person.png");
    }
}
