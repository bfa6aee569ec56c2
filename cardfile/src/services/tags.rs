//! Tags service

use crate::config::MAX_TAG_NAME_LENGTH;
use crate::database::{Repository, Tag, TagUsage};
use crate::error::{AppError, Result};

/// Service for managing tags
#[derive(Clone)]
pub struct TagService {
    repo: Repository,
}

impl TagService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// All tags, alphabetical
    pub async fn get_all(&self) -> Result<Vec<Tag>> {
        self.repo.list_tags().await
    }

    pub async fn get_all_with_counts(&self) -> Result<Vec<TagUsage>> {
        self.repo.list_tags_with_counts().await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Tag>> {
        self.repo.get_tag(id).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        self.repo.get_tag_by_name(name).await
    }

    /// Create a tag. Fails if the name is taken.
    pub async fn add(&self, name: &str) -> Result<Tag> {
        let name = validate_tag_name(name)?;

        tracing::info!("Creating tag: {}", name);

        self.repo.create_tag(None, name).await
    }

    /// Existing tag with this name, or a new one
    pub async fn upsert(&self, name: &str) -> Result<Tag> {
        let name = validate_tag_name(name)?;

        self.repo.upsert_tag(name).await
    }

    /// Rename a tag. Returns `None` for unknown ids.
    pub async fn update(&self, id: &str, name: &str) -> Result<Option<Tag>> {
        let name = validate_tag_name(name)?;

        tracing::info!("Renaming tag {} to {}", id, name);

        self.repo.rename_tag(id, name).await
    }

    /// Delete a tag and unlink it from every card
    pub async fn delete(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting tag: {}", id);

        self.repo.delete_tag(id).await?;

        Ok(())
    }
}

/// Trim and bound-check a tag name
pub(crate) fn validate_tag_name(name: &str) -> Result<&str> {
    let name = name.trim();

    if name.is_empty() {
        return Err(AppError::validation("tag name is required"));
    }
    if name.chars().count() > MAX_TAG_NAME_LENGTH {
        return Err(AppError::validation(format!(
            "tag name exceeds {} characters",
            MAX_TAG_NAME_LENGTH
        )));
    }

    Ok(name)
}
