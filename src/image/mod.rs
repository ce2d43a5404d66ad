//! Upload decoding
//!
//! Reads user-supplied files and converts them into [`EncodedImage`]s,
//! accepting only image-typed payloads.
//!
//! [`EncodedImage`]: crate::models::EncodedImage

pub mod codec;
pub mod mime;
pub mod mock;
pub mod reader;

pub use codec::{encode, encode_file};
pub use mock::MockImageReader;
pub use reader::FsImageReader;

use crate::models::{FileHandle, RawFile};
use crate::Result;
use async_trait::async_trait;

/// Asynchronous "read file bytes" capability behind every upload slot.
#[async_trait]
pub trait ImageReader: Send + Sync {
    async fn read(&self, handle: &FileHandle) -> Result<RawFile>;
}
