//! Inline image checks, run before anything is uploaded.

use thiserror::Error;

use crate::domain::value_objects::EmbeddedImage;

pub const DEFAULT_MAX_SIZE_KB: u64 = 500;

pub const SUPPORTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRejection {
    #[error("Invalid image format: {0}. Only JPEG, JPG, PNG and WEBP are allowed.")]
    InvalidFormat(String),

    #[error("Image size ({size_kb}KB) exceeds the {max_kb}KB limit.")]
    TooLarge { size_kb: u64, max_kb: u64 },

    #[error("Image {0} is not owned by this product.")]
    NotOwned(String),
}

impl ImageRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "INVALID_FORMAT",
            Self::TooLarge { .. } => "TOO_LARGE",
            Self::NotOwned(_) => "NOT_OWNED",
        }
    }
}

/// Checks the declared type and the size estimated from the encoded length.
///
/// Nothing is decoded; the payload is only measured.
pub fn validate(payload: &str, max_size_kb: u64) -> Result<EmbeddedImage, ImageRejection> {
    if !EmbeddedImage::is_embedded(payload) {
        return Err(ImageRejection::InvalidFormat("not a base64 encoded image".into()));
    }
    let image = EmbeddedImage::parse(payload).map_err(|e| ImageRejection::InvalidFormat(e.to_string()))?;
    if !SUPPORTED_MIME_TYPES.contains(&image.mime()) {
        return Err(ImageRejection::InvalidFormat(image.mime().to_string()));
    }

    let bytes = image.estimated_bytes();
    if bytes > max_size_kb.saturating_mul(1024) {
        return Err(ImageRejection::TooLarge { size_kb: bytes.div_ceil(1024), max_kb: max_size_kb });
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(mime: &str, encoded_len: usize) -> String {
        format!("data:{mime};base64,{}", "A".repeat(encoded_len))
    }

    #[test]
    fn accepts_every_supported_type() {
        for mime in SUPPORTED_MIME_TYPES {
            assert!(validate(&payload(mime, 8), DEFAULT_MAX_SIZE_KB).is_ok(), "{mime}");
        }
    }

    #[test]
    fn rejects_unknown_types_and_plain_strings() {
        let err = validate(&payload("image/gif", 8), DEFAULT_MAX_SIZE_KB).unwrap_err();
        assert_eq!(err, ImageRejection::InvalidFormat("image/gif".into()));
        assert_eq!(err.code(), "INVALID_FORMAT");
        assert_eq!(validate("https://cdn/x.png", 500).unwrap_err().code(), "INVALID_FORMAT");
        assert_eq!(validate("data:image/png,AAAA", 500).unwrap_err().code(), "INVALID_FORMAT");
    }

    #[test]
    fn size_limit_uses_encoded_length() {
        // 4 encoded chars per 3 bytes: 1024 * 4 chars is exactly 3 KB.
        assert!(validate(&payload("image/png", 4096), 3).is_ok());
        let err = validate(&payload("image/png", 4100), 3).unwrap_err();
        assert_eq!(err, ImageRejection::TooLarge { size_kb: 4, max_kb: 3 });
        assert_eq!(err.code(), "TOO_LARGE");
    }
}
