//! Action dispatch for one editing session.

use super::action::{Action, Outcome};
use super::session::{Event, Session, UploadSlot};
use crate::ai::{Operation, PromptModel};
use crate::image::{self, ImageReader};
use crate::models::FileHandle;
use crate::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Injectable service bundle used to construct a [`Controller`].
pub struct WorkflowServices {
    pub model: Box<dyn PromptModel>,
    pub reader: Box<dyn ImageReader>,
}

struct Inner {
    model: Box<dyn PromptModel>,
    reader: Box<dyn ImageReader>,
    state: watch::Sender<Arc<Session>>,
}

/// Owns the session and sequences remote calls against it.
///
/// Cloning is cheap and every clone drives the same session, so actions can
/// be dispatched concurrently from several tasks. Each transition replaces
/// the published snapshot in one step.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl Controller {
    pub fn with_services(services: WorkflowServices) -> Self {
        let (state, _) = watch::channel(Arc::new(Session::default()));
        Self {
            inner: Arc::new(Inner {
                model: services.model,
                reader: services.reader,
                state,
            }),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Session> {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Session>> {
        self.inner.state.subscribe()
    }

    /// Apply `action` and, for remote operations and uploads, await their
    /// completion.
    ///
    /// Returns `Err(Error::Validation)` only when a precondition is not met,
    /// in which case nothing changed and no request was sent. Remote and I/O
    /// failures are recorded in the session and reported as
    /// [`Outcome::Failed`].
    pub async fn dispatch(&self, action: Action) -> Result<Outcome> {
        debug!("Dispatching {}", action.name());

        match action {
            Action::UploadTarget(handle) => Ok(self.upload(UploadSlot::Target, handle).await),
            Action::UploadInput(handle) => Ok(self.upload(UploadSlot::Input, handle).await),
            Action::UploadReference(handle) => {
                Ok(self.upload(UploadSlot::Reference, handle).await)
            }
            Action::RemoveTarget => self.commit(Event::TargetRemoved).map(|(o, _)| o),
            Action::RemoveInput(index) => self.commit(Event::InputRemoved(index)).map(|(o, _)| o),
            Action::RemoveReference => self.commit(Event::ReferenceRemoved).map(|(o, _)| o),
            Action::EditRequirements(text) => {
                self.commit(Event::RequirementsEdited(text)).map(|(o, _)| o)
            }
            Action::EditPrompt(text) => self.commit(Event::PromptEdited(text)).map(|(o, _)| o),
            Action::Generate => self.generate().await,
            Action::Optimize => self.optimize().await,
            Action::RunTest => self.run_test().await,
        }
    }

    /// Fold one event into the published snapshot, atomically with respect
    /// to every other transition.
    fn commit(&self, event: Event) -> Result<(Outcome, Arc<Session>)> {
        let mut result = None;
        self.inner.state.send_if_modified(|current| {
            let transition = match current.apply(event) {
                Ok(transition) => transition,
                Err(e) => {
                    result = Some(Err(e));
                    return false;
                }
            };
            let changed = match transition.next {
                Some(next) => {
                    *current = Arc::new(next);
                    true
                }
                None => false,
            };
            result = Some(Ok((transition.outcome, current.clone())));
            changed
        });

        result.unwrap_or_else(|| {
            Err(crate::Error::Invariant(
                "session transition produced no result".to_string(),
            ))
        })
    }

    /// Mark `operation` in flight. `None` means it already was.
    fn begin(&self, operation: Operation) -> Result<Option<(u64, Arc<Session>)>> {
        let (outcome, snapshot) = self.commit(Event::Started(operation)).map_err(|e| {
            debug!("Refused to start {}: {}", operation, e);
            e
        })?;

        if outcome == Outcome::Ignored {
            debug!("{} already in flight, ignoring duplicate request", operation);
            return Ok(None);
        }
        let token = snapshot.operations.get(operation).token();
        info!("Started {} (request {})", operation, token);
        Ok(Some((token, snapshot)))
    }

    fn finish(&self, operation: Operation, event: Event) -> Result<Outcome> {
        let (outcome, _) = self.commit(event)?;
        match &outcome {
            Outcome::Applied => info!("{} completed", operation),
            Outcome::Failed(reason) => warn!("{} failed: {}", operation, reason),
            Outcome::Discarded => debug!("Dropped stale {} result", operation),
            Outcome::Ignored => {}
        }
        Ok(outcome)
    }

    async fn generate(&self) -> Result<Outcome> {
        let Some((token, snapshot)) = self.begin(Operation::DerivePrompt)? else {
            return Ok(Outcome::Ignored);
        };

        let result = self
            .inner
            .model
            .derive_prompt(
                snapshot.target_image.as_ref(),
                &snapshot.input_images,
                &snapshot.additional_requirements,
            )
            .await
            .map_err(|e| e.to_string());

        self.finish(
            Operation::DerivePrompt,
            Event::PromptDerived { token, result },
        )
    }

    async fn optimize(&self) -> Result<Outcome> {
        let Some((token, snapshot)) = self.begin(Operation::RefinePrompt)? else {
            return Ok(Outcome::Ignored);
        };
        let prompt = snapshot.prompt.clone().unwrap_or_default();

        let result = self
            .inner
            .model
            .refine_prompt(&prompt)
            .await
            .map_err(|e| e.to_string());

        self.finish(
            Operation::RefinePrompt,
            Event::PromptRefined { token, result },
        )
    }

    async fn run_test(&self) -> Result<Outcome> {
        let Some((token, snapshot)) = self.begin(Operation::RenderTest)? else {
            return Ok(Outcome::Ignored);
        };
        let prompt = snapshot.prompt.clone().unwrap_or_default();
        let references: Vec<_> = snapshot.test_reference_image.iter().cloned().collect();

        let result = self
            .inner
            .model
            .render_from_prompt(&prompt, &references)
            .await
            .map_err(|e| e.to_string());

        self.finish(Operation::RenderTest, Event::TestRendered { token, result })
    }

    async fn upload(&self, slot: UploadSlot, handle: FileHandle) -> Outcome {
        let token = match self.commit(Event::UploadStarted { slot }) {
            Ok((_, snapshot)) => snapshot.upload_token(slot),
            Err(e) => return Outcome::Failed(e.to_string()),
        };

        let event = match image::encode_file(&*self.inner.reader, &handle).await {
            Ok(image) => {
                info!(
                    "Loaded {:?} image {} ({} bytes, {})",
                    slot,
                    handle.path.display(),
                    image.len(),
                    image.mime_type()
                );
                Event::Uploaded { slot, token, image }
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", handle.path.display(), e);
                Event::UploadFailed {
                    slot,
                    token,
                    category: e.category(),
                    reason: e.to_string(),
                }
            }
        };

        match self.commit(event) {
            Ok((outcome, _)) => outcome,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}
