//! Card attachments service
//!
//! Upload boundary for card files. Payloads are stored in the database next
//! to their metadata; type and size are checked before anything is written.

use crate::config::{ALLOWED_CONTENT_TYPES, MAX_ATTACHMENT_SIZE, MAX_FILE_NAME_LENGTH};
use crate::database::{CardAttachment, NewAttachment, Repository};
use crate::error::{AppError, Result};

/// Service for managing card attachments
#[derive(Clone)]
pub struct CardAttachmentService {
    repo: Repository,
}

impl CardAttachmentService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Whether a MIME type is on the allow-list. Parameters such as
    /// `; charset=utf-8` are ignored.
    pub fn is_valid_file_type(content_type: &str) -> bool {
        let essence = content_type.split(';').next().unwrap_or_default().trim();

        ALLOWED_CONTENT_TYPES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
    }

    pub fn is_valid_file_size(size: i64) -> bool {
        size > 0 && size <= MAX_ATTACHMENT_SIZE
    }

    /// All attachments, newest first
    pub async fn get_all(&self) -> Result<Vec<CardAttachment>> {
        self.repo.list_attachments().await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<CardAttachment>> {
        self.repo.get_attachment(id).await
    }

    /// A card's attachments, newest first
    pub async fn get_by_card_id(&self, card_id: &str) -> Result<Vec<CardAttachment>> {
        self.repo.list_attachments_for_card(card_id).await
    }

    /// Payload only
    pub async fn get_file_data(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.repo.get_attachment_data(id).await
    }

    /// Validate and store an upload
    pub async fn add(&self, upload: NewAttachment) -> Result<CardAttachment> {
        let size = upload.data.len() as i64;

        if !Self::is_valid_file_type(&upload.content_type) {
            tracing::warn!("Rejected attachment type: {}", upload.content_type);
            return Err(AppError::validation(format!(
                "file type not allowed: {}",
                upload.content_type
            )));
        }
        if !Self::is_valid_file_size(size) {
            tracing::warn!("Rejected attachment size: {} bytes", size);
            return Err(AppError::validation(format!(
                "file size must be between 1 and {} bytes",
                MAX_ATTACHMENT_SIZE
            )));
        }
        if !self.repo.card_exists(&upload.card_id).await? {
            return Err(AppError::CardNotFound(upload.card_id));
        }

        let file_name = sanitize_filename(&upload.file_name);

        tracing::info!(
            "Creating attachment: {} for card: {} (size: {} bytes)",
            file_name,
            upload.card_id,
            size
        );

        let attachment = self
            .repo
            .create_attachment(&upload.card_id, &file_name, &upload.content_type, &upload.data)
            .await?;

        tracing::info!("Attachment created: {}", attachment.id);

        Ok(attachment)
    }

    /// Rename an attachment. `None` for unknown ids.
    pub async fn update(&self, id: &str, file_name: &str) -> Result<Option<CardAttachment>> {
        let file_name = sanitize_filename(file_name);

        tracing::debug!("Renaming attachment {} to {}", id, file_name);

        self.repo.rename_attachment(id, &file_name).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting attachment: {}", id);

        self.repo.delete_attachment(id).await?;

        Ok(())
    }
}

/// Sanitize filename to prevent path traversal
fn sanitize_filename(filename: &str) -> String {
    let name: String = filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .take(MAX_FILE_NAME_LENGTH)
        .collect();

    if name.trim().is_empty() {
        "file".to_string()
    } else {
        name
    }
}
