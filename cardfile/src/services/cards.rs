//! Cards service
//!
//! Validation and ownership rules for cards. Persistence of a card and its
//! tag links happens in one repository transaction.

use crate::config::{MAX_CONTENT_LENGTH, MAX_TITLE_LENGTH};
use crate::database::{Card, CardInsert, CreateCardRequest, Repository, TagRef, UpdateCardRequest};
use crate::error::{AppError, Result};
use crate::services::tags::validate_tag_name;
use chrono::Utc;
use uuid::Uuid;

/// Who owns a card created without an explicit owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OwnerPolicy {
    /// The earliest-created user; `NoOwner` if there are no users
    #[default]
    EarliestUser,
    /// Callers must always name the owner
    Require,
}

/// Service for managing cards
#[derive(Clone)]
pub struct CardService {
    repo: Repository,
    owner_policy: OwnerPolicy,
}

impl CardService {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            owner_policy: OwnerPolicy::default(),
        }
    }

    pub fn with_owner_policy(mut self, owner_policy: OwnerPolicy) -> Self {
        self.owner_policy = owner_policy;
        self
    }

    /// All cards, newest first
    pub async fn get_all(&self) -> Result<Vec<Card>> {
        self.repo.list_cards().await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Card>> {
        self.repo.get_card(id).await
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Vec<Card>> {
        self.repo.list_cards_by_user(user_id).await
    }

    pub async fn get_by_tag(&self, tag_name: &str) -> Result<Vec<Card>> {
        self.repo.list_cards_by_tag(tag_name.trim()).await
    }

    pub async fn count(&self) -> Result<i64> {
        self.repo.count_cards().await
    }

    /// Case-insensitive substring match over title and content
    pub async fn search(&self, query: &str) -> Result<Vec<Card>> {
        let query = query.trim().to_lowercase();

        tracing::debug!("Searching cards: {}", query);

        let cards = self.repo.list_cards().await?;
        if query.is_empty() {
            return Ok(cards);
        }

        Ok(cards
            .into_iter()
            .filter(|card| card_matches(card, &query))
            .collect())
    }

    /// Create a card, upserting its tags by name
    pub async fn add(&self, req: CreateCardRequest) -> Result<Card> {
        validate_card(&req.title, req.content.as_deref())?;
        let tags = normalize_tags(req.tags)?;

        let user_id = self.resolve_owner(req.user_id).await?;

        tracing::info!("Creating card: {}", req.title);

        let card = self
            .repo
            .create_card(CardInsert {
                id: req.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                title: req.title,
                content: req.content,
                created_at: req.created_at.unwrap_or_else(Utc::now),
                user_id,
                tags,
            })
            .await?;

        tracing::info!("Card created successfully: {}", card.id);

        Ok(card)
    }

    /// Update title, content and optionally the tag set. `None` for unknown ids.
    pub async fn update(&self, mut req: UpdateCardRequest) -> Result<Option<Card>> {
        validate_card(&req.title, req.content.as_deref())?;
        req.tags = req.tags.map(normalize_tags).transpose()?;

        tracing::debug!("Updating card: {}", req.id);

        let card = self.repo.update_card(req).await?;

        if let Some(card) = &card {
            tracing::debug!("Card updated successfully: {}", card.id);
        }

        Ok(card)
    }

    /// Delete a card with its tag links and attachments
    pub async fn delete(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting card: {}", id);

        if self.repo.delete_card(id).await? {
            tracing::info!("Card deleted successfully: {}", id);
        }

        Ok(())
    }

    /// Move a card to the recycle bin. False if it is unknown or already binned.
    pub async fn trash(&self, id: &str) -> Result<bool> {
        let trashed = self.repo.trash_card(id, Utc::now()).await?;
        if trashed {
            tracing::info!("Card moved to recycle bin: {}", id);
        }
        Ok(trashed)
    }

    pub async fn restore(&self, id: &str) -> Result<bool> {
        let restored = self.repo.restore_card(id).await?;
        if restored {
            tracing::info!("Card restored from recycle bin: {}", id);
        }
        Ok(restored)
    }

    /// A user's binned cards, most recently binned first
    pub async fn get_trash(&self, user_id: &str) -> Result<Vec<Card>> {
        self.repo.list_trashed_cards(user_id).await
    }

    /// Permanently delete a binned card
    pub async fn purge(&self, id: &str) -> Result<bool> {
        let purged = self.repo.purge_card(id).await?;
        if purged {
            tracing::info!("Card purged: {}", id);
        }
        Ok(purged)
    }

    /// Permanently delete every binned card of a user; returns how many went
    pub async fn empty_trash(&self, user_id: &str) -> Result<u64> {
        let purged = self.repo.empty_trash(user_id).await?;
        tracing::info!("Recycle bin emptied: {} cards", purged);
        Ok(purged)
    }

    pub async fn set_locked(&self, id: &str, locked: bool) -> Result<bool> {
        tracing::debug!("Setting card {} locked={}", id, locked);
        self.repo.set_card_locked(id, locked).await
    }

    async fn resolve_owner(&self, user_id: Option<String>) -> Result<String> {
        if let Some(user_id) = user_id {
            return match self.repo.get_user(&user_id).await? {
                Some(user) => Ok(user.id),
                None => Err(AppError::UserNotFound(user_id)),
            };
        }

        match self.owner_policy {
            OwnerPolicy::Require => Err(AppError::NoOwner),
            OwnerPolicy::EarliestUser => {
                let user = self.repo.earliest_user().await?.ok_or(AppError::NoOwner)?;
                tracing::debug!("Assigning card to earliest user: {}", user.id);
                Ok(user.id)
            }
        }
    }
}

/// `needle` must already be lowercase
pub(crate) fn card_matches(card: &Card, needle: &str) -> bool {
    card.title.to_lowercase().contains(needle)
        || card
            .content
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(needle))
}

fn validate_card(title: &str, content: Option<&str>) -> Result<()> {
    if title.trim().is_empty() {
        tracing::warn!("Rejected card with blank title");
        return Err(AppError::validation("title is required"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::validation(format!(
            "title exceeds {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    if let Some(content) = content {
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(AppError::validation(format!(
                "content exceeds {} characters",
                MAX_CONTENT_LENGTH
            )));
        }
    }
    Ok(())
}

fn normalize_tags(tags: Vec<TagRef>) -> Result<Vec<TagRef>> {
    tags.into_iter()
        .map(|tag| match tag {
            TagRef::Name(name) => Ok(TagRef::Name(validate_tag_name(&name)?.to_string())),
            TagRef::Id(id) => Ok(TagRef::Id(id)),
        })
        .collect()
}
