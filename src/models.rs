//! Data models and structures
//!
//! Defines the canonical image representation shared by the codec, the
//! remote model clients and the workflow, plus runtime configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// An uploaded or generated image, ready for transmission and preview.
///
/// Immutable once created. Each value carries its own identity, so uploading
/// the same file twice yields two distinct images. The payload sits behind an
/// `Arc` so session snapshots can be copied without copying bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    id: Uuid,
    data: Arc<[u8]>,
    mime_type: String,
}

impl EncodedImage {
    pub fn new(data: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Standard base64 of the payload, as sent in inline request parts.
    pub fn to_base64(&self) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// `data:` URL suitable for rendering a preview.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Handle to a file the user picked or dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub path: PathBuf,
    /// Content type reported by the picker, if any.
    pub declared_mime: Option<String>,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            declared_mime: None,
        }
    }

    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        self.declared_mime = Some(mime_type.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Raw bytes produced by reading a [`FileHandle`].
#[derive(Debug, Clone)]
pub struct RawFile {
    pub bytes: Vec<u8>,
    pub declared_mime: Option<String>,
}

// Configuration
pub const DEFAULT_PROMPT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub prompt_model: String,
    pub image_model: String,
    pub request_timeout: Duration,
    pub dry_run: bool,
}

impl Config {
    /// Load `.env` if there is one, then read the process environment.
    pub fn from_env() -> crate::Result<Self> {
        load_dotenv(dotenvy::dotenv())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let dry_run = lookup("DRY_RUN")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let gemini_api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        if gemini_api_key.is_none() && !dry_run {
            return Err(crate::Error::Config("GEMINI_API_KEY not set".to_string()));
        }

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    crate::Error::Config(format!("REQUEST_TIMEOUT_SECS is not a number: {}", raw))
                })?;
                if secs == 0 {
                    return Err(crate::Error::Config(
                        "REQUEST_TIMEOUT_SECS must be positive".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            gemini_api_key,
            prompt_model: lookup("PROMPT_MODEL").unwrap_or_else(|| DEFAULT_PROMPT_MODEL.to_string()),
            image_model: lookup("IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            request_timeout,
            dry_run,
        })
    }
}

/// A missing `.env` is fine; a malformed one is reported.
fn load_dotenv(result: Result<PathBuf, dotenvy::Error>) -> crate::Result<()> {
    match result {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}
