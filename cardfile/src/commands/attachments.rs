//! Attachment-related commands
//!
//! Upload and download of card attachments from the local filesystem.

use super::cards::{owned_card, unlocked_card};
use super::require_user;
use crate::app::AppState;
use crate::database::{CardAttachment, NewAttachment};
use crate::config::MAX_ATTACHMENT_SIZE;
use crate::error::{AppError, Result};
use crate::services::{CardAttachmentService, Session};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
pub struct SavedAttachment {
    #[serde(flatten)]
    pub attachment: CardAttachment,
    pub saved_to: PathBuf,
}

/// Attach a local file to one of the current user's cards
pub async fn add_attachment(
    state: &AppState,
    session: &mut Session,
    card_id: String,
    path: PathBuf,
    content_type: Option<String>,
) -> Result<CardAttachment> {
    let user = require_user(state, session).await?;
    let card = unlocked_card(state, session, &user.id, &card_id).await?;

    let content_type = match content_type {
        Some(content_type) => content_type,
        None => guess_content_type(&path)
            .ok_or_else(|| {
                AppError::validation(format!("cannot tell the file type of {}", path.display()))
            })?
            .to_string(),
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    // Size from metadata so oversized files are never loaded
    let size = i64::try_from(tokio::fs::metadata(&path).await?.len()).unwrap_or(i64::MAX);
    if !CardAttachmentService::is_valid_file_size(size) {
        tracing::warn!("Rejected {:?}: {} bytes", path, size);
        return Err(AppError::validation(format!(
            "file size must be between 1 and {} bytes",
            MAX_ATTACHMENT_SIZE
        )));
    }

    let data = tokio::fs::read(&path).await?;

    state
        .attachments
        .add(NewAttachment {
            card_id: card.id,
            file_name,
            content_type,
            data,
        })
        .await
}

pub async fn list_attachments(
    state: &AppState,
    session: &mut Session,
    card_id: String,
) -> Result<Vec<CardAttachment>> {
    let user = require_user(state, session).await?;
    let card = owned_card(state, &user.id, &card_id).await?;

    state.attachments.get_by_card_id(&card.id).await
}

/// Write an attachment's payload to `output` (or its own name in the
/// current directory)
pub async fn get_attachment(
    state: &AppState,
    session: &mut Session,
    id: String,
    output: Option<PathBuf>,
) -> Result<SavedAttachment> {
    let attachment = owned_attachment(state, session, &id).await?;

    let data = state
        .attachments
        .get_file_data(&attachment.id)
        .await?
        .ok_or_else(|| AppError::AttachmentNotFound(id.clone()))?;

    let saved_to = output.unwrap_or_else(|| PathBuf::from(&attachment.file_name));
    tokio::fs::write(&saved_to, &data).await?;

    tracing::info!("Attachment {} written to {:?}", attachment.id, saved_to);

    Ok(SavedAttachment {
        attachment,
        saved_to,
    })
}

pub async fn delete_attachment(state: &AppState, session: &mut Session, id: String) -> Result<()> {
    let attachment = owned_attachment(state, session, &id).await?;

    state.attachments.delete(&attachment.id).await
}

async fn owned_attachment(
    state: &AppState,
    session: &mut Session,
    id: &str,
) -> Result<CardAttachment> {
    let user = require_user(state, session).await?;

    let attachment = state
        .attachments
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::AttachmentNotFound(id.to_string()))?;

    match unlocked_card(state, session, &user.id, &attachment.card_id).await {
        Ok(_) => {}
        Err(AppError::CardLocked(card_id)) => return Err(AppError::CardLocked(card_id)),
        Err(_) => return Err(AppError::AttachmentNotFound(id.to_string())),
    }

    Ok(attachment)
}

/// MIME type for the allowed attachment extensions
fn guess_content_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();

    let content_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" | "text" | "md" => "text/plain",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };

    Some(content_type)
}
