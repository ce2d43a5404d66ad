//! Prompt generator for image editing models
//!
//! Derives an image-generation prompt from a target image and optional
//! reference images, refines it, and test-renders it through a remote
//! generative model, while keeping the session state consistent across
//! overlapping requests.

pub mod ai;
pub mod app;
pub mod error;
pub mod image;
pub mod models;
pub mod prompts;
pub mod workflow;

pub use error::{Error, Result};
