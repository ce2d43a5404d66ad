//! Session snapshot and the reducer that advances it.
//!
//! A [`Session`] is never mutated in place by callers: every user action and
//! every remote completion is turned into an [`Event`] and folded into the
//! previous snapshot by [`Session::apply`], yielding the next snapshot.

use super::action::Outcome;
use crate::ai::{Operation, MISSING_TARGET};
use crate::models::EncodedImage;
use crate::error::ErrorCategory;
use crate::{Error, Result};

pub(crate) const PROMPT_REQUIRED: &str = "Generate a prompt first.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OperationStatus {
    #[default]
    Idle,
    InFlight,
    Failed(String),
}

impl OperationStatus {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, OperationStatus::InFlight)
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            OperationStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Status of one operation plus the token of its latest issued request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationState {
    pub status: OperationStatus,
    token: u64,
}

impl OperationState {
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Forget any outstanding request and go back to idle.
    fn invalidate(&mut self) {
        self.token += 1;
        self.status = OperationStatus::Idle;
    }

    fn start(&mut self) -> u64 {
        self.token += 1;
        self.status = OperationStatus::InFlight;
        self.token
    }

    fn accepts(&self, token: u64) -> bool {
        self.status.is_in_flight() && self.token == token
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operations {
    pub derive: OperationState,
    pub refine: OperationState,
    pub render: OperationState,
}

impl Operations {
    pub fn get(&self, operation: Operation) -> &OperationState {
        match operation {
            Operation::DerivePrompt => &self.derive,
            Operation::RefinePrompt => &self.refine,
            Operation::RenderTest => &self.render,
        }
    }

    fn get_mut(&mut self, operation: Operation) -> &mut OperationState {
        match operation {
            Operation::DerivePrompt => &mut self.derive,
            Operation::RefinePrompt => &mut self.refine,
            Operation::RenderTest => &mut self.render,
        }
    }
}

/// Places an upload can land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadSlot {
    Target,
    Input,
    Reference,
}

/// A failed read, with the category of the underlying error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadError {
    pub category: ErrorCategory,
    pub message: String,
}

/// Last read failure per upload slot, shown next to the slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadErrors {
    pub target: Option<UploadError>,
    pub input: Option<UploadError>,
    pub reference: Option<UploadError>,
}

impl UploadErrors {
    /// Message to show next to `slot`.
    pub fn get(&self, slot: UploadSlot) -> Option<&str> {
        self.error(slot).map(|e| e.message.as_str())
    }

    pub fn error(&self, slot: UploadSlot) -> Option<&UploadError> {
        match slot {
            UploadSlot::Target => self.target.as_ref(),
            UploadSlot::Input => self.input.as_ref(),
            UploadSlot::Reference => self.reference.as_ref(),
        }
    }

    fn set(&mut self, slot: UploadSlot, error: Option<UploadError>) {
        match slot {
            UploadSlot::Target => self.target = error,
            UploadSlot::Input => self.input = error,
            UploadSlot::Reference => self.reference = error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct UploadTokens {
    target: u64,
    reference: u64,
}

impl UploadTokens {
    /// Single-image slots are last-issued-wins; inputs append and need none.
    fn slot(&mut self, slot: UploadSlot) -> Option<&mut u64> {
        match slot {
            UploadSlot::Target => Some(&mut self.target),
            UploadSlot::Reference => Some(&mut self.reference),
            UploadSlot::Input => None,
        }
    }
}

/// Everything the view needs to render one editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub target_image: Option<EncodedImage>,
    pub input_images: Vec<EncodedImage>,
    pub additional_requirements: String,
    pub prompt: Option<String>,
    pub test_reference_image: Option<EncodedImage>,
    pub generated_test_image: Option<EncodedImage>,
    pub operations: Operations,
    pub upload_errors: UploadErrors,
    upload_tokens: UploadTokens,
}

/// Inputs to the reducer: user edits, operation starts and completions.
#[derive(Debug, Clone)]
pub(crate) enum Event {
    UploadStarted {
        slot: UploadSlot,
    },
    Uploaded {
        slot: UploadSlot,
        token: u64,
        image: EncodedImage,
    },
    UploadFailed {
        slot: UploadSlot,
        token: u64,
        category: ErrorCategory,
        reason: String,
    },
    TargetRemoved,
    InputRemoved(usize),
    ReferenceRemoved,
    RequirementsEdited(String),
    PromptEdited(String),
    Started(Operation),
    PromptDerived {
        token: u64,
        result: std::result::Result<String, String>,
    },
    PromptRefined {
        token: u64,
        result: std::result::Result<String, String>,
    },
    TestRendered {
        token: u64,
        result: std::result::Result<EncodedImage, String>,
    },
}

/// Result of folding one event into a snapshot. `next` is `None` when the
/// event leaves the session untouched.
#[derive(Debug)]
pub(crate) struct Transition {
    pub next: Option<Session>,
    pub outcome: Outcome,
}

impl Transition {
    fn unchanged(outcome: Outcome) -> Self {
        Self {
            next: None,
            outcome,
        }
    }

    fn to(next: Session, outcome: Outcome) -> Self {
        Self {
            next: Some(next),
            outcome,
        }
    }
}

impl Session {
    pub fn status(&self, operation: Operation) -> &OperationStatus {
        &self.operations.get(operation).status
    }

    fn has_prompt(&self) -> bool {
        self.prompt.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    pub fn can_generate(&self) -> bool {
        self.target_image.is_some() && !self.operations.derive.status.is_in_flight()
    }

    pub fn can_optimize(&self) -> bool {
        self.has_prompt() && !self.operations.refine.status.is_in_flight()
    }

    pub fn can_run_test(&self) -> bool {
        self.has_prompt() && !self.operations.render.status.is_in_flight()
    }

    pub fn is_busy(&self) -> bool {
        Operation::ALL
            .iter()
            .any(|op| self.status(*op).is_in_flight())
    }

    /// Token a pending upload into `slot` must present to land.
    pub(crate) fn upload_token(&self, slot: UploadSlot) -> u64 {
        match slot {
            UploadSlot::Target => self.upload_tokens.target,
            UploadSlot::Reference => self.upload_tokens.reference,
            UploadSlot::Input => 0,
        }
    }

    fn upload_is_current(&self, slot: UploadSlot, token: u64) -> bool {
        self.upload_token(slot) == token
    }

    /// Fold `event` into this snapshot.
    ///
    /// Only starting an operation can fail, with `Error::Validation` when its
    /// precondition is not met; the snapshot is then left as it was.
    pub(crate) fn apply(&self, event: Event) -> Result<Transition> {
        let transition = match event {
            Event::UploadStarted { slot } => {
                let mut next = self.clone();
                match next.upload_tokens.slot(slot) {
                    Some(token) => *token += 1,
                    None => return Ok(Transition::unchanged(Outcome::Applied)),
                }
                Transition::to(next, Outcome::Applied)
            }
            Event::Uploaded { slot, token, image } => {
                if !self.upload_is_current(slot, token) {
                    return Ok(Transition::unchanged(Outcome::Discarded));
                }
                let mut next = self.clone();
                match slot {
                    UploadSlot::Target => next.target_image = Some(image),
                    UploadSlot::Input => next.input_images.push(image),
                    UploadSlot::Reference => next.test_reference_image = Some(image),
                }
                next.upload_errors.set(slot, None);
                Transition::to(next, Outcome::Applied)
            }
            Event::UploadFailed {
                slot,
                token,
                category,
                reason,
            } => {
                if !self.upload_is_current(slot, token) {
                    return Ok(Transition::unchanged(Outcome::Discarded));
                }
                let mut next = self.clone();
                next.upload_errors.set(
                    slot,
                    Some(UploadError {
                        category,
                        message: reason.clone(),
                    }),
                );
                Transition::to(next, Outcome::Failed(reason))
            }
            Event::TargetRemoved => {
                let mut next = self.clone();
                next.upload_tokens.target += 1;
                next.upload_errors.target = None;
                let outcome = match next.target_image.take() {
                    Some(_) => Outcome::Applied,
                    None => Outcome::Ignored,
                };
                Transition::to(next, outcome)
            }
            Event::InputRemoved(index) => {
                if index >= self.input_images.len() {
                    return Ok(Transition::unchanged(Outcome::Ignored));
                }
                let mut next = self.clone();
                next.input_images.remove(index);
                Transition::to(next, Outcome::Applied)
            }
            Event::ReferenceRemoved => {
                let mut next = self.clone();
                next.upload_tokens.reference += 1;
                next.upload_errors.reference = None;
                let outcome = match next.test_reference_image.take() {
                    Some(_) => Outcome::Applied,
                    None => Outcome::Ignored,
                };
                Transition::to(next, outcome)
            }
            Event::RequirementsEdited(text) => {
                let mut next = self.clone();
                next.additional_requirements = text;
                Transition::to(next, Outcome::Applied)
            }
            Event::PromptEdited(text) => {
                if self.prompt.is_none() {
                    return Ok(Transition::unchanged(Outcome::Ignored));
                }
                if self.prompt.as_deref() == Some(text.as_str()) {
                    return Ok(Transition::unchanged(Outcome::Applied));
                }
                let mut next = self.clone();
                next.prompt = Some(text);
                // Pending refine and render results belong to the replaced text.
                for operation in [Operation::RefinePrompt, Operation::RenderTest] {
                    let state = next.operations.get_mut(operation);
                    if state.status.is_in_flight() {
                        state.invalidate();
                    }
                }
                Transition::to(next, Outcome::Applied)
            }
            Event::Started(operation) => return self.start(operation),
            Event::PromptDerived { token, result } => {
                if !self.operations.derive.accepts(token) {
                    return Ok(Transition::unchanged(Outcome::Discarded));
                }
                let mut next = self.clone();
                match result {
                    Ok(prompt) => {
                        next.prompt = Some(prompt);
                        next.test_reference_image = next.input_images.first().cloned();
                        next.operations.derive.status = OperationStatus::Idle;
                        Transition::to(next, Outcome::Applied)
                    }
                    Err(reason) => {
                        next.operations.derive.status = OperationStatus::Failed(reason.clone());
                        Transition::to(next, Outcome::Failed(reason))
                    }
                }
            }
            Event::PromptRefined { token, result } => {
                if !self.operations.refine.accepts(token) {
                    return Ok(Transition::unchanged(Outcome::Discarded));
                }
                let mut next = self.clone();
                match result {
                    Ok(prompt) => {
                        next.prompt = Some(prompt);
                        next.operations.refine.status = OperationStatus::Idle;
                        Transition::to(next, Outcome::Applied)
                    }
                    Err(reason) => {
                        next.operations.refine.status = OperationStatus::Failed(reason.clone());
                        Transition::to(next, Outcome::Failed(reason))
                    }
                }
            }
            Event::TestRendered { token, result } => {
                if !self.operations.render.accepts(token) {
                    return Ok(Transition::unchanged(Outcome::Discarded));
                }
                let mut next = self.clone();
                match result {
                    Ok(image) => {
                        next.generated_test_image = Some(image);
                        next.operations.render.status = OperationStatus::Idle;
                        Transition::to(next, Outcome::Applied)
                    }
                    Err(reason) => {
                        next.operations.render.status = OperationStatus::Failed(reason.clone());
                        Transition::to(next, Outcome::Failed(reason))
                    }
                }
            }
        };
        Ok(transition)
    }

    fn start(&self, operation: Operation) -> Result<Transition> {
        if self.status(operation).is_in_flight() {
            return Ok(Transition::unchanged(Outcome::Ignored));
        }

        match operation {
            Operation::DerivePrompt if self.target_image.is_none() => {
                return Err(Error::Validation(MISSING_TARGET.to_string()));
            }
            Operation::RefinePrompt | Operation::RenderTest if !self.has_prompt() => {
                return Err(Error::Validation(PROMPT_REQUIRED.to_string()));
            }
            _ => {}
        }

        let mut next = self.clone();
        next.operations.get_mut(operation).start();

        if operation == Operation::DerivePrompt {
            // Results of the other operations belong to the prompt being replaced.
            next.prompt = None;
            next.generated_test_image = None;
            next.test_reference_image = None;
            next.operations.refine.invalidate();
            next.operations.render.invalidate();
        }

        Ok(Transition::to(next, Outcome::Applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: u8) -> EncodedImage {
        EncodedImage::new(vec![tag], "image/png")
    }

    fn step(session: &Session, event: Event) -> Session {
        session
            .apply(event)
            .unwrap()
            .next
            .unwrap_or_else(|| session.clone())
    }

    fn with_target() -> Session {
        Session {
            target_image: Some(image(0)),
            ..Default::default()
        }
    }

    fn with_prompt(prompt: &str) -> Session {
        let session = step(&with_target(), Event::Started(Operation::DerivePrompt));
        let token = session.operations.derive.token();
        step(
            &session,
            Event::PromptDerived {
                token,
                result: Ok(prompt.to_string()),
            },
        )
    }

    #[test]
    fn test_generate_requires_target() {
        let session = Session::default();
        let err = session
            .apply(Event::Started(Operation::DerivePrompt))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg == MISSING_TARGET));
        assert!(!session.can_generate());
    }

    #[test]
    fn test_optimize_and_test_require_prompt() {
        let session = with_target();
        for op in [Operation::RefinePrompt, Operation::RenderTest] {
            let err = session.apply(Event::Started(op)).unwrap_err();
            assert!(err.is_validation());
        }

        let mut blank = with_prompt("x");
        blank.prompt = Some("   ".to_string());
        assert!(blank.apply(Event::Started(Operation::RefinePrompt)).is_err());
        assert!(!blank.can_optimize());
    }

    #[test]
    fn test_start_resets_prompt_scoped_state() {
        let mut session = with_prompt("old");
        session.generated_test_image = Some(image(9));
        session.test_reference_image = Some(image(8));
        session.operations.render.status = OperationStatus::Failed("boom".to_string());

        let next = step(&session, Event::Started(Operation::DerivePrompt));
        assert_eq!(next.prompt, None);
        assert_eq!(next.generated_test_image, None);
        assert_eq!(next.test_reference_image, None);
        assert_eq!(next.operations.render.status, OperationStatus::Idle);
        assert!(next.operations.derive.status.is_in_flight());
    }

    #[test]
    fn test_duplicate_start_is_ignored() {
        let session = step(&with_target(), Event::Started(Operation::DerivePrompt));
        let transition = session
            .apply(Event::Started(Operation::DerivePrompt))
            .unwrap();
        assert!(transition.next.is_none());
        assert_eq!(transition.outcome, Outcome::Ignored);
    }

    #[test]
    fn test_failed_operation_can_restart() {
        let session = step(&with_target(), Event::Started(Operation::DerivePrompt));
        let token = session.operations.derive.token();
        let failed = step(
            &session,
            Event::PromptDerived {
                token,
                result: Err("quota".to_string()),
            },
        );
        assert_eq!(failed.operations.derive.status.failure(), Some("quota"));

        let retried = step(&failed, Event::Started(Operation::DerivePrompt));
        assert!(retried.operations.derive.status.is_in_flight());
        assert!(retried.operations.derive.token() > token);
    }

    #[test]
    fn test_success_seeds_reference_from_first_input() {
        let a = image(1);
        let b = image(2);
        let mut session = with_target();
        session.input_images = vec![a.clone(), b];

        let started = step(&session, Event::Started(Operation::DerivePrompt));
        let token = started.operations.derive.token();
        let done = step(
            &started,
            Event::PromptDerived {
                token,
                result: Ok("p".to_string()),
            },
        );
        assert_eq!(done.test_reference_image, Some(a));
        assert_eq!(done.operations.derive.status, OperationStatus::Idle);
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let session = with_prompt("first");
        let started = step(&session, Event::Started(Operation::RenderTest));
        let render_token = started.operations.render.token();

        // Regenerating invalidates the render that is still running.
        let regenerating = step(&started, Event::Started(Operation::DerivePrompt));
        let transition = regenerating
            .apply(Event::TestRendered {
                token: render_token,
                result: Ok(image(5)),
            })
            .unwrap();
        assert_eq!(transition.outcome, Outcome::Discarded);
        assert!(transition.next.is_none());
    }

    #[test]
    fn test_refine_failure_keeps_prompt() {
        let session = with_prompt("make it blue");
        let started = step(&session, Event::Started(Operation::RefinePrompt));
        let token = started.operations.refine.token();
        let transition = started
            .apply(Event::PromptRefined {
                token,
                result: Err("network down".to_string()),
            })
            .unwrap();
        let next = transition.next.unwrap();
        assert_eq!(transition.outcome, Outcome::Failed("network down".to_string()));
        assert_eq!(next.prompt.as_deref(), Some("make it blue"));
        assert_eq!(next.operations.derive, session.operations.derive);
        assert_eq!(next.operations.render, session.operations.render);
    }

    #[test]
    fn test_remove_input_by_index() {
        let (a, b, c) = (image(1), image(2), image(3));
        let session = Session {
            input_images: vec![a.clone(), b, c.clone()],
            ..Default::default()
        };

        let next = step(&session, Event::InputRemoved(1));
        assert_eq!(next.input_images, vec![a, c]);

        let transition = session.apply(Event::InputRemoved(3)).unwrap();
        assert!(transition.next.is_none());
        assert_eq!(transition.outcome, Outcome::Ignored);
    }

    #[test]
    fn test_prompt_edit_needs_existing_prompt() {
        let session = with_target();
        let transition = session
            .apply(Event::PromptEdited("typed early".to_string()))
            .unwrap();
        assert_eq!(transition.outcome, Outcome::Ignored);

        let edited = step(&with_prompt("a"), Event::PromptEdited("b".to_string()));
        assert_eq!(edited.prompt.as_deref(), Some("b"));
    }

    #[test]
    fn test_stale_target_upload_is_discarded() {
        let first = step(&Session::default(), Event::UploadStarted { slot: UploadSlot::Target });
        let first_token = first.upload_token(UploadSlot::Target);
        let second = step(&first, Event::UploadStarted { slot: UploadSlot::Target });
        let second_token = second.upload_token(UploadSlot::Target);

        let newer = image(2);
        let landed = step(
            &second,
            Event::Uploaded {
                slot: UploadSlot::Target,
                token: second_token,
                image: newer.clone(),
            },
        );
        let transition = landed
            .apply(Event::Uploaded {
                slot: UploadSlot::Target,
                token: first_token,
                image: image(1),
            })
            .unwrap();
        assert_eq!(transition.outcome, Outcome::Discarded);
        assert_eq!(landed.target_image, Some(newer));
    }

    #[test]
    fn test_upload_failure_is_recorded_on_slot_only() {
        let session = with_prompt("keep me");
        let started = step(&session, Event::UploadStarted { slot: UploadSlot::Reference });
        let token = started.upload_token(UploadSlot::Reference);
        let failed = step(
            &started,
            Event::UploadFailed {
                slot: UploadSlot::Reference,
                token,
                category: ErrorCategory::Io,
                reason: "unreadable".to_string(),
            },
        );
        assert_eq!(failed.upload_errors.get(UploadSlot::Reference), Some("unreadable"));
        assert_eq!(
            failed.upload_errors.error(UploadSlot::Reference).map(|e| e.category),
            Some(ErrorCategory::Io)
        );
        assert_eq!(failed.upload_errors.get(UploadSlot::Target), None);
        assert_eq!(failed.prompt.as_deref(), Some("keep me"));
        assert_eq!(failed.operations, session.operations);
    }

    #[test]
    fn test_input_upload_start_leaves_snapshot_alone() {
        let session = with_prompt("p");
        let transition = session
            .apply(Event::UploadStarted {
                slot: UploadSlot::Input,
            })
            .unwrap();
        assert_eq!(transition.outcome, Outcome::Applied);
        assert!(transition.next.is_none());
    }

    #[test]
    fn test_prompt_edit_invalidates_pending_refine_and_render() {
        let session = with_prompt("draft");
        let refining = step(&session, Event::Started(Operation::RefinePrompt));
        let refine_token = refining.operations.refine.token();
        let rendering = step(&refining, Event::Started(Operation::RenderTest));
        let render_token = rendering.operations.render.token();

        let edited = step(&rendering, Event::PromptEdited("mine".to_string()));
        assert_eq!(*edited.status(Operation::RefinePrompt), OperationStatus::Idle);
        assert_eq!(*edited.status(Operation::RenderTest), OperationStatus::Idle);

        let refined = edited
            .apply(Event::PromptRefined {
                token: refine_token,
                result: Ok("refined draft".to_string()),
            })
            .unwrap();
        assert_eq!(refined.outcome, Outcome::Discarded);
        let rendered = edited
            .apply(Event::TestRendered {
                token: render_token,
                result: Ok(image(9)),
            })
            .unwrap();
        assert_eq!(rendered.outcome, Outcome::Discarded);
        assert_eq!(edited.prompt.as_deref(), Some("mine"));
    }

    #[test]
    fn test_unchanged_prompt_edit_keeps_pending_refine() {
        let refining = step(&with_prompt("draft"), Event::Started(Operation::RefinePrompt));
        let transition = refining
            .apply(Event::PromptEdited("draft".to_string()))
            .unwrap();
        assert_eq!(transition.outcome, Outcome::Applied);
        assert!(transition.next.is_none());
    }
}
