//! Remote generative model integration
//!
//! Defines the three request/response operations the workflow relies on and
//! provides a Gemini REST implementation plus a scripted mock.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiPromptClient;
pub use mock::MockPromptModel;

use crate::models::EncodedImage;
use crate::Result;
use async_trait::async_trait;
use std::fmt;

/// The remote operations, each tracked independently by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DerivePrompt,
    RefinePrompt,
    RenderTest,
}

impl Operation {
    pub const ALL: [Operation; 3] = [
        Operation::DerivePrompt,
        Operation::RefinePrompt,
        Operation::RenderTest,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Operation::DerivePrompt => "derive-prompt",
            Operation::RefinePrompt => "optimize-prompt",
            Operation::RenderTest => "render-test-image",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[async_trait]
pub trait PromptModel: Send + Sync {
    /// Describe how to produce `target`, using `inputs` as context.
    ///
    /// Fails with `Error::Validation` without contacting the model when no
    /// target is given.
    async fn derive_prompt(
        &self,
        target: Option<&EncodedImage>,
        inputs: &[EncodedImage],
        extra_instructions: &str,
    ) -> Result<String>;

    /// Return an improved version of `prompt`. Callers replace their prompt
    /// with the result.
    async fn refine_prompt(&self, prompt: &str) -> Result<String>;

    async fn render_from_prompt(
        &self,
        prompt: &str,
        references: &[EncodedImage],
    ) -> Result<EncodedImage>;
}

pub(crate) const MISSING_TARGET: &str = "Please upload a target image.";
pub(crate) const EMPTY_PROMPT: &str = "The prompt is empty.";
