use super::mime::mime_from_extension;
use super::ImageReader;
use crate::models::{FileHandle, RawFile};
use crate::Result;
use async_trait::async_trait;

/// Reads uploads from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageReader;

impl FsImageReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageReader for FsImageReader {
    async fn read(&self, handle: &FileHandle) -> Result<RawFile> {
        let bytes = tokio::fs::read(&handle.path).await.map_err(|e| {
            tracing::warn!("Failed to read {}: {}", handle.path.display(), e);
            e
        })?;

        let declared_mime = handle
            .declared_mime
            .clone()
            .or_else(|| mime_from_extension(&handle.path).map(str::to_string));

        Ok(RawFile {
            bytes,
            declared_mime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_bytes_and_infers_type_from_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("target.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let raw = FsImageReader::new()
            .read(&FileHandle::new(&path))
            .await
            .unwrap();
        assert_eq!(raw.bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert_eq!(raw.declared_mime.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_declared_type_wins_over_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, b"data").unwrap();

        let raw = FsImageReader::new()
            .read(&FileHandle::new(&path).with_mime("image/webp"))
            .await
            .unwrap();
        assert_eq!(raw.declared_mime.as_deref(), Some("image/webp"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = FsImageReader::new()
            .read(&FileHandle::new(dir.path().join("nope.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
