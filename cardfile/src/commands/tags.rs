//! Tag commands

use super::require_user;
use crate::app::AppState;
use crate::database::{Tag, TagUsage};
use crate::error::{AppError, Result};
use crate::services::Session;

/// All tags with how many cards use them
pub async fn list_tags(state: &AppState, session: &mut Session) -> Result<Vec<TagUsage>> {
    require_user(state, session).await?;

    state.tags.get_all_with_counts().await
}

/// Rename a tag given by id or name
pub async fn rename_tag(
    state: &AppState,
    session: &mut Session,
    tag: String,
    new_name: String,
) -> Result<Tag> {
    require_user(state, session).await?;
    let existing = find_tag(state, &tag).await?;

    state
        .tags
        .update(&existing.id, &new_name)
        .await?
        .ok_or(AppError::TagNotFound(tag))
}

/// Delete a tag given by id or name; cards keep their other tags
pub async fn delete_tag(state: &AppState, session: &mut Session, tag: String) -> Result<()> {
    require_user(state, session).await?;
    let existing = find_tag(state, &tag).await?;

    state.tags.delete(&existing.id).await
}

async fn find_tag(state: &AppState, id_or_name: &str) -> Result<Tag> {
    if let Some(tag) = state.tags.get_by_id(id_or_name).await? {
        return Ok(tag);
    }

    state
        .tags
        .get_by_name(id_or_name.trim())
        .await?
        .ok_or_else(|| AppError::TagNotFound(id_or_name.to_string()))
}
