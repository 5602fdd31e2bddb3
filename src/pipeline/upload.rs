use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, TryOnError};
use crate::state::data::{has_accepted_extension, ImageRef, Slot, ACCEPTED_EXTENSIONS};
use crate::state::session::SharedSession;
use crate::state::storage::StorageManager;

/// Bridges a user-chosen file to one of the two slots
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    storage: Arc<StorageManager>,
    session: SharedSession,
}

impl UploadPipeline {
    pub fn new(storage: Arc<StorageManager>, session: SharedSession) -> Self {
        Self { storage, session }
    }

    /// Copy `source` into the slot's directory and make it the slot's
    /// current image. Re-uploading the same file is allowed.
    ///
    /// The Session stays locked while the file is placed, so a run that
    /// finishes meanwhile can't discard the new image as stale. The image
    /// captured by a run in flight is left in the slot directory.
    pub fn upload(&self, slot: Slot, source: &Path) -> Result<ImageRef> {
        validate_source(source)?;

        let mut session = self.session.lock();
        let keep = session.in_flight_image(slot).map(|image| image.path().to_path_buf());
        let image = self.storage.place(slot, source, keep.as_deref())?;
        session.set_image(slot, image.clone());

        log::info!("✅ {} slot now holds {}", slot, image.file_name());
        Ok(image)
    }
}

/// Accept only existing, readable regular files with an image extension
fn validate_source(source: &Path) -> Result<()> {
    let metadata = std::fs::metadata(source)
        .map_err(|e| TryOnError::InvalidInput(format!("{}: {}", source.display(), e)))?;

    if !metadata.is_file() {
        return Err(TryOnError::InvalidInput(format!(
            "{} is not a regular file",
            source.display()
        )));
    }

    if !has_accepted_extension(source) {
        return Err(TryOnError::InvalidInput(format!(
            "{} is not an accepted image type (expected one of: {})",
            source.display(),
            ACCEPTED_EXTENSIONS.join(", ")
        )));
    }

    File::open(source)
        .map_err(|e| TryOnError::InvalidInput(format!("{} is not readable: {}", source.display(), e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::RunState;
    use std::fs;
    use tempfile::TempDir;

    fn pipeline(tmp: &TempDir) -> (UploadPipeline, Arc<StorageManager>, SharedSession) {
        let storage = Arc::new(StorageManager::new(tmp.path().join("work"), true));
        storage.ensure_directories().unwrap();
        let session = SharedSession::new();
        (UploadPipeline::new(storage.clone(), session.clone()), storage, session)
    }

    #[test]
    fn test_reupload_keeps_one_file() {
        let tmp = TempDir::new().unwrap();
        let (pipeline, storage, session) = pipeline(&tmp);
        let f = tmp.path().join("f.png");
        let g = tmp.path().join("g.bmp");
        fs::write(&f, b"f").unwrap();
        fs::write(&g, b"g").unwrap();

        pipeline.upload(Slot::Person, &f).unwrap();
        pipeline.upload(Slot::Person, &g).unwrap();

        let entries = storage.slot_entries(Slot::Person).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name().unwrap(), "g.bmp");
        assert_eq!(session.lock().person_image().unwrap().file_name(), "g.bmp");
    }

    #[test]
    fn test_upload_during_run_keeps_captured_file() {
        let tmp = TempDir::new().unwrap();
        let (pipeline, storage, session) = pipeline(&tmp);
        let person = tmp.path().join("person.png");
        let shirt = tmp.path().join("shirt.jpg");
        let dress = tmp.path().join("dress.png");
        fs::write(&person, b"p").unwrap();
        fs::write(&shirt, b"s").unwrap();
        fs::write(&dress, b"d").unwrap();

        pipeline.upload(Slot::Person, &person).unwrap();
        let captured = pipeline.upload(Slot::Garment, &shirt).unwrap();
        session.lock().begin_run().unwrap();

        let replacement = pipeline.upload(Slot::Garment, &dress).unwrap();

        assert!(captured.path().is_file());
        assert!(replacement.path().is_file());
        assert_eq!(storage.slot_entries(Slot::Garment).unwrap().len(), 2);
        assert_eq!(session.lock().garment_image(), Some(&replacement));
        assert_eq!(session.state(), RunState::Running);
    }

    #[test]
    fn test_second_upload_makes_ready() {
        let tmp = TempDir::new().unwrap();
        let (pipeline, _storage, session) = pipeline(&tmp);
        let person = tmp.path().join("person.png");
        let shirt = tmp.path().join("shirt.jpg");
        fs::write(&person, b"p").unwrap();
        fs::write(&shirt, b"s").unwrap();

        pipeline.upload(Slot::Person, &person).unwrap();
        assert_eq!(session.state(), RunState::Idle);
        pipeline.upload(Slot::Garment, &shirt).unwrap();
        assert_eq!(session.state(), RunState::Ready);
    }

    #[test]
    fn test_rejected_uploads_leave_state_alone() {
        let tmp = TempDir::new().unwrap();
        let (pipeline, storage, session) = pipeline(&tmp);
        let gif = tmp.path().join("anim.gif");
        fs::write(&gif, b"gif").unwrap();

        let err = pipeline.upload(Slot::Garment, &gif).unwrap_err();
        assert!(matches!(err, TryOnError::InvalidInput(_)));

        let err = pipeline
            .upload(Slot::Garment, &tmp.path().join("missing.png"))
            .unwrap_err();
        assert!(matches!(err, TryOnError::InvalidInput(_)));

        let err = pipeline.upload(Slot::Garment, tmp.path()).unwrap_err();
        assert!(matches!(err, TryOnError::InvalidInput(_)));

        assert!(session.lock().garment_image().is_none());
        assert!(storage.slot_entries(Slot::Garment).unwrap().is_empty());
    }
}
