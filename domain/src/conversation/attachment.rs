//! Pending image attachment
//!
//! An uploaded image is known twice: as the stored asset path written into the
//! saved history, and as the inline payload sent to a multimodal provider.
//! [`PendingAttachment`] keeps both together so they cannot drift apart.

use serde::{Deserialize, Serialize};

/// Upload progress of an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Loading,
    Error(String),
}

/// Result of the asset-upload collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAsset {
    pub file_path: String,
    #[serde(default)]
    pub file_id: String,
}

/// Provider-native inline representation (base64 payload with its MIME type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

/// Image the user attached to the message being composed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingAttachment {
    pub upload_state: UploadState,
    pub stored: Option<StoredAsset>,
    pub inline: Option<InlineImage>,
}

impl PendingAttachment {
    /// An attachment whose upload is still running.
    pub fn loading() -> Self {
        Self {
            upload_state: UploadState::Loading,
            ..Self::default()
        }
    }

    /// A completed upload with both representations.
    pub fn ready(stored: StoredAsset, inline: InlineImage) -> Self {
        Self {
            upload_state: UploadState::Idle,
            stored: Some(stored),
            inline: Some(inline),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            upload_state: UploadState::Error(message.into()),
            ..Self::default()
        }
    }

    /// Path written into the saved history.
    pub fn stored_path(&self) -> Option<&str> {
        self.stored.as_ref().map(|s| s.file_path.as_str())
    }

    /// Uploads in progress or failed block submission until resolved or cleared.
    pub fn blocking_reason(&self) -> Option<String> {
        match &self.upload_state {
            UploadState::Idle => None,
            UploadState::Loading => Some("attachment upload still in progress".to_string()),
            UploadState::Error(msg) => Some(msg.clone()),
        }
    }

    /// True once the upload finished and both representations are present.
    pub fn is_ready(&self) -> bool {
        self.upload_state == UploadState::Idle && self.stored.is_some() && self.inline.is_some()
    }
}
