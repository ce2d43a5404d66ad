use super::{Operation, PromptModel, EMPTY_PROMPT, MISSING_TARGET};
use crate::models::EncodedImage;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// 1x1 PNG returned when no render response is scripted.
const DEFAULT_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 pixel
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44,
    0x41, // IDAT chunk
    0x54, 0x08, 0x99, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0xE2, 0x25,
    0x00, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, // IEND chunk
    0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Arguments seen by the most recent call of each operation.
#[derive(Debug, Clone, Default)]
pub struct RecordedCalls {
    pub derive_inputs: Vec<EncodedImage>,
    pub derive_instructions: Option<String>,
    pub refine_prompt: Option<String>,
    pub render_prompt: Option<String>,
    pub render_references: Vec<EncodedImage>,
}

/// Scripted [`PromptModel`].
///
/// Scripted outcomes are cycled per operation. A gated operation parks every
/// call until [`MockPromptModel::release`] hands it a permit, which lets
/// tests observe the in-flight state.
#[derive(Clone, Default)]
pub struct MockPromptModel {
    prompt_responses: Arc<Mutex<Vec<std::result::Result<String, String>>>>,
    refine_responses: Arc<Mutex<Vec<std::result::Result<String, String>>>>,
    image_responses: Arc<Mutex<Vec<std::result::Result<EncodedImage, String>>>>,
    call_counts: Arc<Mutex<HashMap<Operation, usize>>>,
    gates: Arc<Mutex<HashMap<Operation, Arc<Semaphore>>>>,
    recorded: Arc<Mutex<RecordedCalls>>,
}

impl MockPromptModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt_response(self, response: impl Into<String>) -> Self {
        self.prompt_responses
            .lock()
            .unwrap()
            .push(Ok(response.into()));
        self
    }

    pub fn with_prompt_failure(self, detail: impl Into<String>) -> Self {
        self.prompt_responses
            .lock()
            .unwrap()
            .push(Err(detail.into()));
        self
    }

    pub fn with_refine_response(self, response: impl Into<String>) -> Self {
        self.refine_responses
            .lock()
            .unwrap()
            .push(Ok(response.into()));
        self
    }

    pub fn with_refine_failure(self, detail: impl Into<String>) -> Self {
        self.refine_responses
            .lock()
            .unwrap()
            .push(Err(detail.into()));
        self
    }

    pub fn with_image_response(self, image: EncodedImage) -> Self {
        self.image_responses.lock().unwrap().push(Ok(image));
        self
    }

    pub fn with_image_failure(self, detail: impl Into<String>) -> Self {
        self.image_responses
            .lock()
            .unwrap()
            .push(Err(detail.into()));
        self
    }

    /// Hold calls of `operation` until released.
    pub fn with_gate(self, operation: Operation) -> Self {
        self.gates
            .lock()
            .unwrap()
            .insert(operation, Arc::new(Semaphore::new(0)));
        self
    }

    /// Let one parked (or future) call of `operation` complete.
    pub fn release(&self, operation: Operation) {
        if let Some(gate) = self.gates.lock().unwrap().get(&operation) {
            gate.add_permits(1);
        }
    }

    pub fn get_call_count(&self) -> usize {
        self.call_counts.lock().unwrap().values().sum()
    }

    pub fn get_operation_count(&self, operation: Operation) -> usize {
        self.call_counts
            .lock()
            .unwrap()
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn recorded(&self) -> RecordedCalls {
        self.recorded.lock().unwrap().clone()
    }

    /// Count the call, wait at the gate if any, and return the call index.
    async fn enter(&self, operation: Operation) -> usize {
        let index = {
            let mut counts = self.call_counts.lock().unwrap();
            let count = counts.entry(operation).or_insert(0);
            *count += 1;
            *count - 1
        };

        let gate = self.gates.lock().unwrap().get(&operation).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        index
    }

    fn scripted<T: Clone>(
        responses: &Mutex<Vec<std::result::Result<T, String>>>,
        index: usize,
    ) -> Option<Result<T>> {
        let responses = responses.lock().unwrap();
        if responses.is_empty() {
            return None;
        }
        Some(responses[index % responses.len()].clone().map_err(Error::Remote))
    }
}

#[async_trait]
impl PromptModel for MockPromptModel {
    async fn derive_prompt(
        &self,
        target: Option<&EncodedImage>,
        inputs: &[EncodedImage],
        extra_instructions: &str,
    ) -> Result<String> {
        if target.is_none() {
            return Err(Error::Validation(MISSING_TARGET.to_string()));
        }
        {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.derive_inputs = inputs.to_vec();
            recorded.derive_instructions = Some(extra_instructions.to_string());
        }

        let index = self.enter(Operation::DerivePrompt).await;
        Self::scripted(&self.prompt_responses, index).unwrap_or_else(|| {
            Ok(format!(
                "Recreate the target image using {} input image(s)",
                inputs.len()
            ))
        })
    }

    async fn refine_prompt(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(Error::Validation(EMPTY_PROMPT.to_string()));
        }
        self.recorded.lock().unwrap().refine_prompt = Some(prompt.to_string());

        let index = self.enter(Operation::RefinePrompt).await;
        Self::scripted(&self.refine_responses, index)
            .unwrap_or_else(|| Ok(format!("{}, highly detailed", prompt.trim())))
    }

    async fn render_from_prompt(
        &self,
        prompt: &str,
        references: &[EncodedImage],
    ) -> Result<EncodedImage> {
        {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.render_prompt = Some(prompt.to_string());
            recorded.render_references = references.to_vec();
        }

        let index = self.enter(Operation::RenderTest).await;
        Self::scripted(&self.image_responses, index)
            .unwrap_or_else(|| Ok(EncodedImage::new(DEFAULT_PNG, "image/png")))
    }
}
