use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

use crate::models::{EncodedImage, ImageMime, MAX_UPLOAD_BYTES};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),
    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },
    #[error("Failed to read file: {0}")]
    Io(#[from] io::Error),
}

/// Which slot an upload fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRole {
    Character,
    Clothing,
}

impl UploadRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadRole::Character => "character",
            UploadRole::Clothing => "clothing",
        }
    }
}

/// A file the user picked. Type and size are known without reading contents.
#[async_trait]
pub trait SelectedFile: Send + Sync {
    fn mime_type(&self) -> &str;
    fn size(&self) -> u64;
    async fn read_bytes(&self) -> io::Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    mime_type: String,
    size: u64,
}

impl LocalFile {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }
        Ok(LocalFile {
            mime_type: mime_for_path(&path).to_string(),
            size: metadata.len(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SelectedFile for LocalFile {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// Declared type from the extension, the way a browser file picker reports it.
pub fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Type first, then size. Neither check touches file contents.
pub fn validate_upload(file: &dyn SelectedFile) -> Result<ImageMime, UploadError> {
    let mime = ImageMime::parse(file.mime_type())
        .ok_or_else(|| UploadError::InvalidFileType(file.mime_type().to_string()))?;
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(UploadError::FileTooLarge {
            size: file.size(),
            max: MAX_UPLOAD_BYTES,
        });
    }
    Ok(mime)
}

pub async fn encode_upload(file: &dyn SelectedFile) -> Result<EncodedImage, UploadError> {
    let mime = validate_upload(file)?;
    let bytes = file.read_bytes().await?;
    Ok(EncodedImage::new(
        general_purpose::STANDARD.encode(bytes),
        mime.as_str(),
    ))
}

pub async fn encode_role(
    role: UploadRole,
    file: &dyn SelectedFile,
) -> Result<EncodedImage, UploadError> {
    let encoded = encode_upload(file).await?;
    debug!(
        "Encoded {} upload (mime={}, bytes={}, base64_len={})",
        role.as_str(),
        encoded.mime_type,
        file.size(),
        encoded.base64.len()
    );
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct MemoryFile {
        mime_type: String,
        size: u64,
        bytes: Vec<u8>,
        reads: AtomicUsize,
    }

    impl MemoryFile {
        fn new(mime_type: &str, bytes: Vec<u8>) -> Self {
            MemoryFile {
                mime_type: mime_type.to_string(),
                size: bytes.len() as u64,
                bytes,
                reads: AtomicUsize::new(0),
            }
        }

        fn sized(mime_type: &str, size: u64) -> Self {
            MemoryFile {
                mime_type: mime_type.to_string(),
                size,
                bytes: Vec::new(),
                reads: AtomicUsize::new(0),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SelectedFile for MemoryFile {
        fn mime_type(&self) -> &str {
            &self.mime_type
        }

        fn size(&self) -> u64 {
            self.size
        }

        async fn read_bytes(&self) -> io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes.clone())
        }
    }

    #[tokio::test]
    async fn disallowed_types_are_rejected_without_reading() {
        for mime in ["image/gif", "image/jpg", "application/pdf", "", "IMAGE/PNG"] {
            let file = MemoryFile::new(mime, vec![1, 2, 3]);
            let err = encode_upload(&file).await.unwrap_err();
            assert!(matches!(err, UploadError::InvalidFileType(_)), "{mime}");
            assert_eq!(file.reads(), 0);
        }
    }

    #[tokio::test]
    async fn type_is_checked_before_size() {
        let file = MemoryFile::sized("image/gif", MAX_UPLOAD_BYTES + 1);
        let err = encode_upload(&file).await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidFileType(_)));
    }

    #[tokio::test]
    async fn one_byte_over_the_limit_is_too_large() {
        let file = MemoryFile::sized("image/png", MAX_UPLOAD_BYTES + 1);
        let err = encode_upload(&file).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::FileTooLarge { size, max } if size == MAX_UPLOAD_BYTES + 1 && max == MAX_UPLOAD_BYTES
        ));
        assert_eq!(file.reads(), 0);
    }

    #[tokio::test]
    async fn exactly_at_the_limit_is_accepted() {
        let file = MemoryFile::new("image/webp", vec![7u8; MAX_UPLOAD_BYTES as usize]);
        let encoded = encode_upload(&file).await.unwrap();
        assert_eq!(encoded.mime_type, "image/webp");
        assert_eq!(file.reads(), 1);
    }

    #[tokio::test]
    async fn encoded_base64_decodes_to_original_bytes() {
        let original: Vec<u8> = (0..=255u8).cycle().take(10_007).collect();
        let file = MemoryFile::new("image/jpeg", original.clone());

        let encoded = encode_role(UploadRole::Clothing, &file).await.unwrap();

        assert!(!encoded.base64.starts_with("data:"));
        let decoded = general_purpose::STANDARD.decode(&encoded.base64).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn extension_decides_declared_type() {
        assert_eq!(mime_for_path(Path::new("hero.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("shirt.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("shirt.jpg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("dress.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("anim.gif")), "image/gif");
        assert_eq!(mime_for_path(Path::new("notes")), "application/octet-stream");
    }

    #[tokio::test]
    async fn local_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("character.png");
        tokio::fs::write(&path, b"\x89PNG fake").await.unwrap();

        let file = LocalFile::open(&path).await.unwrap();
        assert_eq!(file.mime_type(), "image/png");
        assert_eq!(file.size(), 9);

        let encoded = encode_upload(&file).await.unwrap();
        assert_eq!(
            general_purpose::STANDARD.decode(encoded.base64).unwrap(),
            b"\x89PNG fake"
        );
    }

    #[tokio::test]
    async fn local_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalFile::open(dir.path()).await.is_err());
    }
}
