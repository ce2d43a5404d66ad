use super::ImageReader;
use crate::models::{FileHandle, RawFile};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
struct MockFile {
    bytes: Vec<u8>,
    delay: Duration,
}

/// In-memory [`ImageReader`] keyed by path. Unknown paths fail with
/// `NotFound`, like a file that disappeared between pick and read.
#[derive(Clone, Default)]
pub struct MockImageReader {
    files: Arc<Mutex<HashMap<PathBuf, MockFile>>>,
    read_count: Arc<Mutex<usize>>,
}

impl MockImageReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        self.with_delayed_file(path, bytes, Duration::ZERO)
    }

    /// Register a file whose read takes `delay` to complete.
    pub fn with_delayed_file(
        self,
        path: impl Into<PathBuf>,
        bytes: Vec<u8>,
        delay: Duration,
    ) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), MockFile { bytes, delay });
        self
    }

    pub fn get_read_count(&self) -> usize {
        *self.read_count.lock().unwrap()
    }
}

#[async_trait]
impl ImageReader for MockImageReader {
    async fn read(&self, handle: &FileHandle) -> Result<RawFile> {
        *self.read_count.lock().unwrap() += 1;

        let file = self.files.lock().unwrap().get(&handle.path).cloned();
        let file = file.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not readable", handle.path.display()),
            )
        })?;

        if !file.delay.is_zero() {
            tokio::time::sleep(file.delay).await;
        }

        Ok(RawFile {
            bytes: file.bytes,
            declared_mime: handle.declared_mime.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_reader_returns_registered_bytes() {
        let reader = MockImageReader::new().with_file("a.png", vec![1, 2]);
        let raw = reader
            .read(&FileHandle::new("a.png").with_mime("image/png"))
            .await
            .unwrap();
        assert_eq!(raw.bytes, vec![1, 2]);
        assert_eq!(raw.declared_mime.as_deref(), Some("image/png"));
        assert_eq!(reader.get_read_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_reader_unknown_path_fails() {
        let reader = MockImageReader::new();
        assert!(reader.read(&FileHandle::new("b.png")).await.is_err());
        assert_eq!(reader.get_read_count(), 1);
    }
}
