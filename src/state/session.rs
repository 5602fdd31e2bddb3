/// The in-memory record of one interactive run of the application
///
/// A `Session` is owned by a `SharedSession` handle which is injected into
/// both the upload pipeline and the processing invoker. Every read and write
/// goes through one exclusive lock.

use std::sync::{Arc, Mutex, MutexGuard};

use super::data::{ImageRef, RunOutcome, RunState, Slot};
use crate::error::{Result, TryOnError};

#[derive(Debug, Default)]
pub struct Session {
    person_image: Option<ImageRef>,
    garment_image: Option<ImageRef>,
    /// Only set after both inputs were present and a run succeeded
    output_image: Option<ImageRef>,
    /// Inputs captured by the run in flight; `Some` is the single-flight flag
    in_flight: Option<(ImageRef, ImageRef)>,
    last_outcome: Option<RunOutcome>,
}

impl Session {
    pub fn person_image(&self) -> Option<&ImageRef> {
        self.person_image.as_ref()
    }

    pub fn garment_image(&self) -> Option<&ImageRef> {
        self.garment_image.as_ref()
    }

    pub fn image(&self, slot: Slot) -> Option<&ImageRef> {
        match slot {
            Slot::Person => self.person_image(),
            Slot::Garment => self.garment_image(),
        }
    }

    pub fn output_image(&self) -> Option<&ImageRef> {
        self.output_image.as_ref()
    }

    /// The slot's image as captured by the run in flight. Storage must
    /// keep this file until the run finishes.
    pub fn in_flight_image(&self, slot: Slot) -> Option<&ImageRef> {
        self.in_flight.as_ref().map(|(person, garment)| match slot {
            Slot::Person => person,
            Slot::Garment => garment,
        })
    }

    /// Diagnostic text of the last failed run, if the last run failed
    pub fn last_error(&self) -> Option<&str> {
        match &self.last_outcome {
            Some(RunOutcome::Failed(message)) => Some(message),
            _ => None,
        }
    }

    pub fn state(&self) -> RunState {
        if self.in_flight.is_some() {
            return RunState::Running;
        }
        if self.person_image.is_none() || self.garment_image.is_none() {
            return RunState::Idle;
        }
        match self.last_outcome {
            None => RunState::Ready,
            Some(RunOutcome::Succeeded(_)) => RunState::Succeeded,
            Some(RunOutcome::Failed(_)) => RunState::Failed,
        }
    }

    /// Record a freshly placed image. A new input makes the previous
    /// outcome stale, so the state falls back to Ready (or Idle).
    pub fn set_image(&mut self, slot: Slot, image: ImageRef) {
        match slot {
            Slot::Person => self.person_image = Some(image),
            Slot::Garment => self.garment_image = Some(image),
        }
        if self.in_flight.is_none() {
            self.last_outcome = None;
        }
    }

    /// Enter `Running` and capture the inputs the run will use.
    ///
    /// Fails without side effects when a slot is empty or a run is
    /// already in flight.
    pub fn begin_run(&mut self) -> Result<(ImageRef, ImageRef)> {
        if self.in_flight.is_some() {
            return Err(TryOnError::Busy);
        }
        let (person, garment) = match (&self.person_image, &self.garment_image) {
            (Some(person), Some(garment)) => (person.clone(), garment.clone()),
            (None, None) => {
                return Err(TryOnError::Precondition(
                    "Please load both images before running the try-on.".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(TryOnError::Precondition(
                    "Please load a person image before running the try-on.".to_string(),
                ))
            }
            (Some(_), None) => {
                return Err(TryOnError::Precondition(
                    "Please load a garment image before running the try-on.".to_string(),
                ))
            }
        };
        self.in_flight = Some((person.clone(), garment.clone()));
        Ok((person, garment))
    }

    /// Leave `Running` with the given result.
    ///
    /// Failure never touches the stored images or the previous output.
    pub fn finish_run(&mut self, result: &Result<ImageRef>) {
        self.in_flight = None;
        match result {
            Ok(output) => {
                self.output_image = Some(output.clone());
                self.last_outcome = Some(RunOutcome::Succeeded(output.clone()));
            }
            Err(err) => {
                self.last_outcome = Some(RunOutcome::Failed(err.to_string()));
            }
        }
    }
}

/// Cloneable, thread-safe handle to the application's single Session
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the session. A poisoned lock is recovered: every mutation
    /// above is a single assignment, so no half-written state can exist.
    pub fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> RunState {
        self.lock().state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolFailure;

    fn loaded() -> Session {
        let mut session = Session::default();
        session.set_image(Slot::Person, ImageRef::new("user_input_image/person.png"));
        session.set_image(Slot::Garment, ImageRef::new("garment_input_image/shirt.jpg"));
        session
    }

    #[test]
    fn test_idle_until_both_images() {
        let mut session = Session::default();
        assert_eq!(session.state(), RunState::Idle);
        session.set_image(Slot::Garment, ImageRef::new("garment_input_image/shirt.jpg"));
        assert_eq!(session.state(), RunState::Idle);
        session.set_image(Slot::Person, ImageRef::new("user_input_image/person.png"));
        assert_eq!(session.state(), RunState::Ready);
    }

    #[test]
    fn test_begin_run_requires_person() {
        let mut session = Session::default();
        session.set_image(Slot::Garment, ImageRef::new("garment_input_image/shirt.jpg"));
        let err = session.begin_run().unwrap_err();
        assert!(matches!(err, TryOnError::Precondition(_)));
        assert_eq!(session.state(), RunState::Idle);
    }

    #[test]
    fn test_second_begin_is_busy() {
        let mut session = loaded();
        session.begin_run().unwrap();
        assert_eq!(session.state(), RunState::Running);
        assert!(matches!(session.begin_run(), Err(TryOnError::Busy)));
    }

    #[test]
    fn test_failure_keeps_inputs() {
        let mut session = loaded();
        session.begin_run().unwrap();
        session.finish_run(&Err(ToolFailure::Exit { code: Some(1), stderr: "boom".into() }.into()));

        assert_eq!(session.state(), RunState::Failed);
        assert!(session.output_image().is_none());
        assert!(session.last_error().unwrap().contains("boom"));
        assert!(session.person_image().is_some());
        assert!(session.garment_image().is_some());
        assert!(session.state().can_run());
    }

    #[test]
    fn test_upload_during_run_keeps_running() {
        let mut session = loaded();
        let (person, _) = session.begin_run().unwrap();
        session.set_image(Slot::Person, ImageRef::new("user_input_image/bob.png"));

        assert_eq!(session.state(), RunState::Running);
        assert_eq!(person.file_name(), "person.png");
        assert_eq!(session.person_image().unwrap().file_name(), "bob.png");
        assert_eq!(session.in_flight_image(Slot::Person), Some(&person));
    }

    #[test]
    fn test_finish_releases_captured_images() {
        let mut session = loaded();
        assert!(session.in_flight_image(Slot::Garment).is_none());
        session.begin_run().unwrap();
        assert_eq!(
            session.in_flight_image(Slot::Garment).unwrap().file_name(),
            "shirt.jpg"
        );

        session.finish_run(&Ok(ImageRef::new("output_images/person_shirt.png")));
        assert!(session.in_flight_image(Slot::Garment).is_none());
        assert_eq!(session.image(Slot::Garment).unwrap().file_name(), "shirt.jpg");
    }

    #[test]
    fn test_upload_after_success_returns_to_ready() {
        let mut session = loaded();
        session.begin_run().unwrap();
        session.finish_run(&Ok(ImageRef::new("output_images/person_shirt.png")));
        assert_eq!(session.state(), RunState::Succeeded);

        session.set_image(Slot::Garment, ImageRef::new("garment_input_image/dress.png"));
        assert_eq!(session.state(), RunState::Ready);
        // The previous output is still the last produced image
        assert!(session.output_image().is_some());
    }
}
