use super::mime::{is_image_mime, sniff_image_mime};
use super::ImageReader;
use crate::models::{EncodedImage, FileHandle};
use crate::{Error, Result};

/// Turn raw upload bytes into an [`EncodedImage`].
///
/// A declared `image/*` type is trusted as-is; the bytes are not decoded.
/// Anything else is sniffed from its signature and rejected when it does not
/// look like an image.
pub fn encode(bytes: Vec<u8>, declared_mime: Option<&str>) -> Result<EncodedImage> {
    let mime_type = match declared_mime.map(str::trim) {
        Some(declared) if is_image_mime(declared) => declared.to_ascii_lowercase(),
        declared => sniff_image_mime(&bytes)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Unsupported file type: {}",
                    declared.filter(|d| !d.is_empty()).unwrap_or("unknown")
                ))
            })?,
    };

    Ok(EncodedImage::new(bytes, mime_type))
}

/// Read a file through `reader` and encode it. Read failures propagate
/// untouched and no image is produced.
pub async fn encode_file(reader: &dyn ImageReader, handle: &FileHandle) -> Result<EncodedImage> {
    let raw = reader.read(handle).await?;
    tracing::debug!(
        "Read {} bytes from {} (declared type: {:?})",
        raw.bytes.len(),
        handle.path.display(),
        raw.declared_mime
    );
    encode(raw.bytes, raw.declared_mime.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::MockImageReader;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_declared_type_is_trusted() {
        let image = encode(b"not really a gif".to_vec(), Some("image/gif")).unwrap();
        assert_eq!(image.mime_type(), "image/gif");
        assert_eq!(image.bytes(), b"not really a gif");
    }

    #[test]
    fn test_missing_type_is_sniffed() {
        let image = encode(PNG_HEADER.to_vec(), None).unwrap();
        assert_eq!(image.mime_type(), "image/png");
    }

    #[test]
    fn test_non_image_type_is_rejected() {
        let err = encode(b"hello".to_vec(), Some("text/plain")).unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("text/plain")));
    }

    #[test]
    fn test_wrong_declared_type_falls_back_to_sniffing() {
        let image = encode(PNG_HEADER.to_vec(), Some("application/octet-stream")).unwrap();
        assert_eq!(image.mime_type(), "image/png");
    }

    #[tokio::test]
    async fn test_encode_file_propagates_read_failure() {
        let reader = MockImageReader::new();
        let err = encode_file(&reader, &FileHandle::new("missing.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_encode_file_uses_declared_type() {
        let reader = MockImageReader::new().with_file("cat.webp", b"RIFF".to_vec());
        let image = encode_file(&reader, &FileHandle::new("cat.webp").with_mime("image/webp"))
            .await
            .unwrap();
        assert_eq!(image.mime_type(), "image/webp");
        assert_eq!(image.len(), 4);
    }
}
