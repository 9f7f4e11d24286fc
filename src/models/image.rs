use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::fmt;
use std::sync::Arc;

/// Raster formats the editor accepts and the model may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// MIME type sent to (and reported by) the inference API
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    /// File extension used for downloads
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }

    /// Parse a MIME type, ignoring case and parameters (`image/png; q=1`)
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    /// Map from the `image` crate's format detection result
    pub fn from_detected(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::WebP => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    /// The `image` crate format used to validate headers
    pub fn to_detected(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Webp => image::ImageFormat::WebP,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Webp => "WEBP",
        };
        f.write_str(name)
    }
}

/// An encoded image value.
///
/// Images are immutable once produced: edits never modify an `Image` in place, they
/// produce a new one. The encoded bytes live behind an `Arc`, so cloning an image
/// (for state snapshots, or to hand it to the inference client) is cheap.
#[derive(Clone)]
pub struct Image {
    bytes: Arc<[u8]>,
    format: ImageFormat,
}

impl Image {
    /// Wrap already-encoded bytes. No validation is performed here; see
    /// [`crate::services::image_io::decode_image`] for validated construction.
    pub fn new(bytes: impl Into<Arc<[u8]>>, format: ImageFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Base64 payload for inline API parts
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// True when both values share the same allocation (one was cloned from the other)
    pub fn ptr_eq(&self, other: &Image) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format && (self.ptr_eq(other) || self.bytes == other.bytes)
    }
}

impl Eq for Image {}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}
