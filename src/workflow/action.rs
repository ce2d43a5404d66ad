use crate::models::FileHandle;

/// Every state-changing request the view can make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    UploadTarget(FileHandle),
    RemoveTarget,
    UploadInput(FileHandle),
    RemoveInput(usize),
    UploadReference(FileHandle),
    RemoveReference,
    EditRequirements(String),
    EditPrompt(String),
    Generate,
    Optimize,
    RunTest,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::UploadTarget(_) => "upload-target",
            Action::RemoveTarget => "remove-target",
            Action::UploadInput(_) => "upload-input",
            Action::RemoveInput(_) => "remove-input",
            Action::UploadReference(_) => "upload-reference",
            Action::RemoveReference => "remove-reference",
            Action::EditRequirements(_) => "edit-requirements",
            Action::EditPrompt(_) => "edit-prompt",
            Action::Generate => "generate",
            Action::Optimize => "optimize",
            Action::RunTest => "run-test",
        }
    }
}

/// What dispatching an action did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The session moved to a new snapshot.
    Applied,
    /// Nothing to do: duplicate request, out-of-range index, empty slot.
    Ignored,
    /// The request completed after being superseded; its result was dropped.
    Discarded,
    /// The request failed and the reason was recorded in the session.
    Failed(String),
}
