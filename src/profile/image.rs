//! Profile image payloads
//!
//! Avatars are stored inline on the profile document as base64 data URIs.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{ServiceError, ServiceResult};

/// Largest accepted image file.
pub const MAX_IMAGE_BYTES: usize = 512 * 1024;

/// Sniff the image type from its leading bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

/// Encode raw image bytes as a data URI.
pub fn encode_data_uri(bytes: &[u8]) -> ServiceResult<String> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ServiceError::validation(format!(
            "Image is too large (max {} KiB)",
            MAX_IMAGE_BYTES / 1024
        )));
    }
    let mime = sniff_mime(bytes).ok_or_else(|| {
        ServiceError::validation("Unsupported image type (use PNG, JPEG, GIF or WebP)")
    })?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

/// Read a local image file into a data URI.
pub async fn load_data_uri(path: &Path) -> ServiceResult<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ServiceError::validation(format!("Cannot read {}: {}", path.display(), e))
    })?;
    encode_data_uri(&bytes)
}

/// Mime type and decoded size of a stored data URI, for display.
pub fn describe(data_uri: &str) -> Option<(String, usize)> {
    let rest = data_uri.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(payload).ok()?;
    Some((mime.to_string(), bytes.len()))
}
