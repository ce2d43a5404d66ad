use super::client::GeminiHttpClient;
use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
    ThinkingConfig,
};
use crate::ai::{PromptModel, EMPTY_PROMPT, MISSING_TARGET};
use crate::image::mime::{detect_image_mime, is_image_mime};
use crate::models::EncodedImage;
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use std::time::Duration;

const MAX_PROMPT_TOKENS: u32 = 8192;
const THINKING_BUDGET: u32 = 1024;

/// Gemini-backed [`PromptModel`]: a text model derives and refines prompts,
/// an image model renders test images.
pub struct GeminiPromptClient {
    text: GeminiHttpClient,
    image: GeminiHttpClient,
}

impl GeminiPromptClient {
    pub fn new(
        api_key: String,
        prompt_model: String,
        image_model: String,
        timeout: Duration,
    ) -> Self {
        Self::new_with_client(
            api_key,
            prompt_model,
            image_model,
            timeout,
            reqwest::Client::new(),
        )
    }

    pub fn new_with_client(
        api_key: String,
        prompt_model: String,
        image_model: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            text: GeminiHttpClient::new_with_client(
                api_key.clone(),
                prompt_model,
                timeout,
                client.clone(),
            ),
            image: GeminiHttpClient::new_with_client(api_key, image_model, timeout, client),
        }
    }

    /// Point both models at another endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.text = self.text.with_base_url(base_url.clone());
        self.image = self.image.with_base_url(base_url);
        self
    }

    fn text_request(system: &str, parts: Vec<Part>) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Some(Content::system(system)),
            contents: vec![Content::user(parts)],
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(MAX_PROMPT_TOKENS),
                thinking_config: Some(ThinkingConfig {
                    thinking_budget: THINKING_BUDGET,
                }),
                ..Default::default()
            }),
        }
    }

    fn extract_text(response: &GenerateContentResponse) -> Result<String> {
        let text: String = response
            .first_parts()
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Remote(response.empty_reason()));
        }
        Ok(text.to_string())
    }

    fn extract_image(response: &GenerateContentResponse) -> Result<EncodedImage> {
        let inline = response
            .first_parts()
            .iter()
            .find_map(|p| match p {
                Part::InlineData { inline_data } => Some(inline_data),
                _ => None,
            })
            .ok_or_else(|| Error::Remote(response.empty_reason()))?;

        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| Error::Remote(format!("Failed to decode Gemini base64 image: {}", e)))?;

        let mime_type = if is_image_mime(&inline.mime_type) {
            inline.mime_type.clone()
        } else {
            detect_image_mime(&bytes).to_string()
        };
        tracing::debug!(
            "Gemini returned image ({} bytes, {})",
            bytes.len(),
            mime_type
        );

        Ok(EncodedImage::new(bytes, mime_type))
    }
}

#[async_trait]
impl PromptModel for GeminiPromptClient {
    async fn derive_prompt(
        &self,
        target: Option<&EncodedImage>,
        inputs: &[EncodedImage],
        extra_instructions: &str,
    ) -> Result<String> {
        let target = target.ok_or_else(|| Error::Validation(MISSING_TARGET.to_string()))?;

        let mut parts = Vec::with_capacity(2 * inputs.len() + 3);
        parts.push(Part::text("Target image:"));
        parts.push(Part::image(target));
        for (i, input) in inputs.iter().enumerate() {
            parts.push(Part::text(format!("Input image {}:", i + 1)));
            parts.push(Part::image(input));
        }

        let requirements = match extra_instructions.trim() {
            "" => prompts::NO_REQUIREMENTS,
            text => text,
        };
        let input_count = inputs.len().to_string();
        parts.push(Part::text(prompts::render(
            prompts::DERIVE_USER,
            &[("requirements", requirements), ("input_count", &input_count)],
        )));

        let request = Self::text_request(prompts::DERIVE_SYSTEM, parts);
        let response = self.text.generate_content(&request).await?;
        Self::extract_text(&response)
    }

    async fn refine_prompt(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(Error::Validation(EMPTY_PROMPT.to_string()));
        }

        let request = Self::text_request(
            prompts::REFINE_SYSTEM,
            vec![Part::text(prompts::render(
                prompts::REFINE_USER,
                &[("prompt", prompt.trim())],
            ))],
        );
        let response = self.text.generate_content(&request).await?;
        Self::extract_text(&response)
    }

    async fn render_from_prompt(
        &self,
        prompt: &str,
        references: &[EncodedImage],
    ) -> Result<EncodedImage> {
        if prompt.trim().is_empty() {
            return Err(Error::Validation(EMPTY_PROMPT.to_string()));
        }

        let mut parts: Vec<Part> = references.iter().map(Part::image).collect();
        parts.push(Part::text(prompt));

        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content::user(parts)],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                ..Default::default()
            }),
        };

        let response = self.image.generate_content(&request).await?;
        Self::extract_image(&response)
    }
}
