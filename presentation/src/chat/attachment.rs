//! Attachment source port for the REPL

use async_trait::async_trait;
use chatline_domain::PendingAttachment;
use std::path::Path;

/// Turns a local path into an attachment ready for the next turn.
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// `stored_path` overrides the path written into the saved history.
    async fn load(
        &self,
        path: &Path,
        stored_path: Option<String>,
    ) -> Result<PendingAttachment, String>;
}
