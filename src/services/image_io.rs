//! Local image I/O: reading uploads and writing downloads.

use crate::models::{Image, ImageFormat};
use crate::services::error::LocalIoError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, OpenOptions};
use std::io::{Cursor, ErrorKind, Write};

/// Filename prefix for editor downloads
pub const EDITED_IMAGE_PREFIX: &str = "edited-image";

/// Filename prefix for saved generations
pub const GENERATED_IMAGE_PREFIX: &str = "generated-image";

/// Read an upload from disk and validate it as a PNG, JPEG or WEBP image.
pub async fn load_image(path: &Utf8Path) -> Result<Image, LocalIoError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| LocalIoError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let image = decode_image(bytes)?;
    tracing::info!("Loaded {} image from {} ({} bytes)", image.format(), path, image.len());
    Ok(image)
}

/// Validate encoded bytes and wrap them as an [`Image`].
///
/// The format is detected from the content, not the file extension. Only the
/// header is decoded (to read the dimensions); pixel data stays encoded.
pub fn decode_image(bytes: Vec<u8>) -> Result<Image, LocalIoError> {
    if bytes.is_empty() {
        return Err(LocalIoError::Empty);
    }

    let detected = image::guess_format(&bytes).map_err(|_| LocalIoError::UnrecognizedFormat)?;
    let format = ImageFormat::from_detected(detected)
        .ok_or_else(|| LocalIoError::UnsupportedFormat(format!("{:?}", detected)))?;

    let (width, height) =
        image::ImageReader::with_format(Cursor::new(bytes.as_slice()), format.to_detected())
            .into_dimensions()
            .map_err(|e| LocalIoError::Decode(e.to_string()))?;

    tracing::debug!("Decoded {} header: {}x{}", format, width, height);

    Ok(Image::new(bytes, format))
}

/// Filename for a download: `<prefix>-<unix millis>.<ext>`
pub fn timestamped_file_name(prefix: &str, format: ImageFormat) -> String {
    format!(
        "{}-{}.{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        format.extension()
    )
}

/// Upper bound on `-N` suffixes tried when a timestamped name is taken
const MAX_NAME_ATTEMPTS: u32 = 100;

/// `name.ext` -> `name-N.ext`
fn suffixed_file_name(file_name: &str, attempt: u32) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{attempt}.{ext}"),
        None => format!("{file_name}-{attempt}"),
    }
}

/// Write an image into `dir` under a timestamp-qualified name.
///
/// The directory is created if needed. Existing files are never overwritten: a
/// taken name gets a `-N` suffix. Returns the written path.
pub fn save_image(image: &Image, dir: &Utf8Path, prefix: &str) -> Result<Utf8PathBuf, LocalIoError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| LocalIoError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let file_name = timestamped_file_name(prefix, image.format());
    let mut path = dir.join(&file_name);

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(image.bytes())
                    .map_err(|source| LocalIoError::Write {
                        path: path.clone(),
                        source,
                    })?;
                tracing::info!("Saved image to {}", path);
                return Ok(path);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!("{} exists, trying another name", path);
                path = dir.join(suffixed_file_name(&file_name, attempt));
            }
            Err(source) => return Err(LocalIoError::Write { path, source }),
        }
    }

    Err(LocalIoError::Write {
        path,
        source: ErrorKind::AlreadyExists.into(),
    })
}
