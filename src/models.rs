use serde::{Deserialize, Serialize};

pub const MAX_UPLOAD_BYTES: u64 = 4 * 1024 * 1024;

/// Body of the proxy's 502 when the provider answered without an image.
pub const NO_IMAGE_RETURNED: &str = "NO_IMAGE_RETURNED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Png,
    Jpeg,
    Webp,
}

impl ImageMime {
    /// Exact match against the accepted upload types; no normalization.
    pub fn parse(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/png" => Some(ImageMime::Png),
            "image/jpeg" => Some(ImageMime::Jpeg),
            "image/webp" => Some(ImageMime::Webp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Webp => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageMime::Png => "png",
            ImageMime::Jpeg => "jpg",
            ImageMime::Webp => "webp",
        }
    }
}

/// Wire form of one image: bare base64 (no `data:` prefix) plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub base64: String,
    pub mime_type: String,
}

impl EncodedImage {
    pub fn new(base64: String, mime_type: &str) -> Self {
        EncodedImage {
            base64,
            mime_type: mime_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositionRequest {
    pub character: EncodedImage,
    pub clothing: EncodedImage,
    pub prompt: String,
}

/// Successful composite, as returned by the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeImage {
    pub image_base64: String,
    pub mime_type: String,
}
