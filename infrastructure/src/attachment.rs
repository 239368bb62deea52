//! Local image loading for attachments
//!
//! Reads an image from disk and builds both representations a
//! [`PendingAttachment`] needs: the stored path written into history and the
//! base64 inline payload sent to multimodal providers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chatline_domain::{InlineImage, PendingAttachment, StoredAsset};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),
}

/// MIME type for an image file, by extension.
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

/// Load `path` as an attachment.
///
/// `stored_path` is the asset path to persist; it defaults to the local path
/// when the image was not uploaded anywhere.
pub async fn load_image(
    path: &Path,
    stored_path: Option<String>,
) -> Result<PendingAttachment, AttachmentError> {
    let mime_type = mime_type_for(path)
        .ok_or_else(|| AttachmentError::UnsupportedType(path.display().to_string()))?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| AttachmentError::Read {
            path: path.display().to_string(),
            source,
        })?;
    debug!("Loaded {} ({} bytes)", path.display(), bytes.len());

    let file_path = stored_path.unwrap_or_else(|| path.display().to_string());
    let file_id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(PendingAttachment::ready(
        StoredAsset { file_path, file_id },
        InlineImage {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(&bytes),
        },
    ))
}
