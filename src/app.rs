//! Headless driver that plays the view's part: feeds actions into the
//! workflow controller and saves what comes back.

use crate::ai::{GeminiPromptClient, MockPromptModel, Operation, PromptModel};
use crate::image::mime::extension_for_mime;
use crate::image::FsImageReader;
use crate::models::{Config, FileHandle};
use crate::error::ErrorCategory;
use crate::workflow::{Action, Controller, Outcome, Session, UploadSlot, WorkflowServices};
use crate::{Error, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What to do in one run.
#[derive(Debug, Clone, Default)]
pub struct RunPlan {
    pub target: PathBuf,
    pub inputs: Vec<PathBuf>,
    pub reference: Option<PathBuf>,
    pub requirements: Option<String>,
    pub optimize: bool,
    pub test: bool,
}

/// Results of a run. Failures of optional steps are collected rather than
/// aborting the run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub prompt: Option<String>,
    pub test_image_path: Option<PathBuf>,
    pub failures: Vec<(Operation, String)>,
}

pub struct App {
    controller: Controller,
    output_dir: PathBuf,
}

impl App {
    /// Build an app from concrete services; used by tests to inject mocks.
    pub fn with_services(services: WorkflowServices, output_dir: PathBuf) -> Self {
        Self {
            controller: Controller::with_services(services),
            output_dir,
        }
    }

    /// Build an app backed by Gemini, or by the mock model in dry-run mode.
    pub fn from_config(config: &Config, output_dir: PathBuf) -> Result<Self> {
        let model: Box<dyn PromptModel> = if config.dry_run {
            info!("DRY_RUN enabled, using the mock prompt model");
            Box::new(MockPromptModel::new())
        } else {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| Error::Config("GEMINI_API_KEY not set".to_string()))?;
            info!(
                "Prompt model: {}, image model: {}",
                config.prompt_model, config.image_model
            );
            Box::new(GeminiPromptClient::new(
                api_key,
                config.prompt_model.clone(),
                config.image_model.clone(),
                config.request_timeout,
            ))
        };

        Ok(Self::with_services(
            WorkflowServices {
                model,
                reader: Box::new(FsImageReader::new()),
            },
            output_dir,
        ))
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub async fn run(&self, plan: &RunPlan) -> Result<RunReport> {
        let mut report = RunReport::default();

        self.upload(UploadSlot::Target, &plan.target)
            .await?;
        for input in &plan.inputs {
            self.upload(UploadSlot::Input, input).await?;
        }
        if let Some(requirements) = &plan.requirements {
            self.controller
                .dispatch(Action::EditRequirements(requirements.clone()))
                .await?;
        }

        if let Outcome::Failed(reason) = self.controller.dispatch(Action::Generate).await? {
            return Err(Error::Remote(reason));
        }
        log_snapshot(&self.controller.snapshot());

        if let Some(reference) = &plan.reference {
            self.upload(UploadSlot::Reference, reference).await?;
        }

        if plan.optimize {
            if let Outcome::Failed(reason) = self.controller.dispatch(Action::Optimize).await? {
                warn!("Keeping the unoptimized prompt: {}", reason);
                report.failures.push((Operation::RefinePrompt, reason));
            }
        }

        if plan.test {
            match self.controller.dispatch(Action::RunTest).await? {
                Outcome::Failed(reason) => {
                    report.failures.push((Operation::RenderTest, reason));
                }
                _ => {
                    if let Some(image) = &self.controller.snapshot().generated_test_image {
                        report.test_image_path = Some(self.save_test_image(
                            image.bytes(),
                            extension_for_mime(image.mime_type()),
                        )?);
                    }
                }
            }
        }

        let session = self.controller.snapshot();
        log_snapshot(&session);
        report.prompt = session.prompt.clone();
        Ok(report)
    }

    /// Upload `path` into `slot`, failing with the category of the read error.
    async fn upload(&self, slot: UploadSlot, path: &Path) -> Result<()> {
        let handle = FileHandle::new(path);
        let action = match slot {
            UploadSlot::Target => Action::UploadTarget(handle),
            UploadSlot::Input => Action::UploadInput(handle),
            UploadSlot::Reference => Action::UploadReference(handle),
        };
        let Outcome::Failed(reason) = self.controller.dispatch(action).await? else {
            return Ok(());
        };

        let category = self
            .controller
            .snapshot()
            .upload_errors
            .error(slot)
            .map(|e| e.category);
        let detail = format!("{}: {}", path.display(), reason);
        Err(match category {
            Some(ErrorCategory::Validation) => Error::Validation(detail),
            _ => Error::Io(std::io::Error::other(detail)),
        })
    }

    fn save_test_image(&self, bytes: &[u8], extension: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .output_dir
            .join(format!("test_{}.{}", stamp, extension));
        fs::write(&path, bytes)?;
        info!("Saved test image at: {}", path.display());
        Ok(path)
    }
}

fn log_snapshot(session: &Session) {
    info!(
        "Session: target={} inputs={} reference={} prompt={} test_image={}",
        session.target_image.is_some(),
        session.input_images.len(),
        session.test_reference_image.is_some(),
        session.prompt.as_ref().map(|p| p.len()).unwrap_or(0),
        session.generated_test_image.is_some()
    );
    for operation in Operation::ALL {
        if let Some(reason) = session.status(operation).failure() {
            warn!("{}: {}", operation, reason);
        }
    }
}
