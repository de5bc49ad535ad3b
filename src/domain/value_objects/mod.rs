//! Value Objects for the catalog

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to an image held by the image store.
///
/// An empty id and url is the "no image" placeholder used by variations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(rename = "public_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
}

impl ImageRef {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self { id: id.into(), url: url.into() }
    }
    pub fn placeholder() -> Self { Self::default() }
    pub fn is_placeholder(&self) -> bool { self.id.is_empty() && self.url.is_empty() }
}

/// Inline image sent in a request body: `data:image/<type>;base64,<bytes>`.
#[derive(Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    uri: String,
    mime_end: usize,
    payload_start: usize,
}

impl EmbeddedImage {
    const SCHEME: &'static str = "data:";
    const ENCODING: &'static str = ";base64,";

    /// Whether the value claims to be an inline image at all.
    pub fn is_embedded(value: &str) -> bool {
        value.starts_with("data:image")
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, EmbeddedImageError> {
        let uri = value.into();
        if !uri.starts_with(Self::SCHEME) { return Err(EmbeddedImageError::NotDataUri); }
        let mime_end = uri.find(Self::ENCODING).ok_or(EmbeddedImageError::MissingEncoding)?;
        if mime_end == Self::SCHEME.len() { return Err(EmbeddedImageError::MissingMime); }
        Ok(Self { payload_start: mime_end + Self::ENCODING.len(), mime_end, uri })
    }

    pub fn mime(&self) -> &str { &self.uri[Self::SCHEME.len()..self.mime_end] }
    pub fn encoded(&self) -> &str { &self.uri[self.payload_start..] }
    pub fn as_data_uri(&self) -> &str { &self.uri }

    /// File extension for the declared type.
    pub fn extension(&self) -> &str {
        match self.mime() {
            "image/jpeg" | "image/jpg" => "jpg",
            other => other.strip_prefix("image/").unwrap_or("bin"),
        }
    }

    /// Decoded size estimate (`encoded length * 3 / 4`, rounded up).
    pub fn estimated_bytes(&self) -> u64 {
        (self.encoded().len() as u64 * 3).div_ceil(4)
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.encoded())
    }
}

impl fmt::Debug for EmbeddedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedImage")
            .field("mime", &self.mime())
            .field("encoded_len", &self.encoded().len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum EmbeddedImageError { NotDataUri, MissingEncoding, MissingMime }
impl std::error::Error for EmbeddedImageError {}
impl fmt::Display for EmbeddedImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDataUri => write!(f, "not a data URI"),
            Self::MissingEncoding => write!(f, "missing base64 declaration"),
            Self::MissingMime => write!(f, "missing MIME type"),
        }
    }
}

/// Opaque identifier of a review author, as issued by the auth service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(String);

impl AuthorId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into().trim().to_string()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}
