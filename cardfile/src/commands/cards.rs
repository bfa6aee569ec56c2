//! Card-related commands
//!
//! CRUD operations, search and the recycle bin, scoped to the signed-in
//! user's cards. Locked cards come back masked unless the session has
//! unlocked them.

use super::require_user;
use crate::app::AppState;
use crate::database::{Card, CreateCardRequest, TagRef, UpdateCardRequest};
use crate::error::{AppError, Result};
use crate::services::cards::card_matches;
use crate::services::locking::{conceal, is_concealed};
use crate::services::Session;

/// Create a card owned by the current user
pub async fn create_card(
    state: &AppState,
    session: &mut Session,
    title: String,
    content: Option<String>,
    tags: Vec<String>,
) -> Result<Card> {
    let user = require_user(state, session).await?;

    state
        .cards
        .add(CreateCardRequest {
            title,
            content,
            user_id: Some(user.id),
            tags: tags.into_iter().map(TagRef::Name).collect(),
            ..Default::default()
        })
        .await
}

/// List the current user's cards, optionally only those with a tag
pub async fn list_cards(
    state: &AppState,
    session: &mut Session,
    tag: Option<String>,
) -> Result<Vec<Card>> {
    let user = require_user(state, session).await?;

    let cards = match tag {
        Some(tag) => state
            .cards
            .get_by_tag(&tag)
            .await?
            .into_iter()
            .filter(|card| card.user_id == user.id)
            .collect(),
        None => state.cards.get_by_user(&user.id).await?,
    };

    let locks = state.locks.get_settings(&user.id).await?;
    Ok(cards
        .into_iter()
        .map(|card| conceal(card, &locks, session))
        .collect())
}

pub async fn get_card(state: &AppState, session: &mut Session, id: String) -> Result<Card> {
    let user = require_user(state, session).await?;
    let card = owned_card(state, &user.id, &id).await?;

    let locks = state.locks.get_settings(&user.id).await?;
    Ok(conceal(card, &locks, session))
}

/// Update a card. Fields left as `None` keep their current value; an empty
/// `content` clears it.
pub async fn update_card(
    state: &AppState,
    session: &mut Session,
    id: String,
    title: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
) -> Result<Card> {
    let user = require_user(state, session).await?;
    let card = unlocked_card(state, session, &user.id, &id).await?;

    let content = match content {
        Some(content) if content.is_empty() => None,
        Some(content) => Some(content),
        None => card.content,
    };

    state
        .cards
        .update(UpdateCardRequest {
            id: card.id,
            title: title.unwrap_or(card.title),
            content,
            tags: tags.map(|names| names.into_iter().map(TagRef::Name).collect()),
        })
        .await?
        .ok_or(AppError::CardNotFound(id))
}

/// Permanently delete a card, bypassing the recycle bin
pub async fn delete_card(state: &AppState, session: &mut Session, id: String) -> Result<()> {
    let user = require_user(state, session).await?;
    let card = unlocked_card(state, session, &user.id, &id).await?;

    state.cards.delete(&card.id).await
}

/// Search the current user's cards by title and content.
///
/// Locked cards only match on what the session can see of them.
pub async fn search_cards(
    state: &AppState,
    session: &mut Session,
    query: String,
) -> Result<Vec<Card>> {
    let user = require_user(state, session).await?;
    let locks = state.locks.get_settings(&user.id).await?;
    let needle = query.trim().to_lowercase();

    Ok(state
        .cards
        .search(&query)
        .await?
        .into_iter()
        .filter(|card| card.user_id == user.id)
        .map(|card| conceal(card, &locks, session))
        .filter(|card| needle.is_empty() || card_matches(card, &needle))
        .collect())
}

// ===== Recycle bin =====

/// Move one of the current user's cards to the recycle bin
pub async fn trash_card(state: &AppState, session: &mut Session, id: String) -> Result<()> {
    let user = require_user(state, session).await?;
    let card = unlocked_card(state, session, &user.id, &id).await?;

    state.cards.trash(&card.id).await?;
    session.relock(&card.id);

    Ok(())
}

/// The current user's binned cards, most recently binned first
pub async fn list_trash(state: &AppState, session: &mut Session) -> Result<Vec<Card>> {
    let user = require_user(state, session).await?;
    let locks = state.locks.get_settings(&user.id).await?;

    Ok(state
        .cards
        .get_trash(&user.id)
        .await?
        .into_iter()
        .map(|card| conceal(card, &locks, session))
        .collect())
}

pub async fn restore_card(state: &AppState, session: &mut Session, id: String) -> Result<Card> {
    let user = require_user(state, session).await?;
    let card = trashed_card(state, &user.id, &id).await?;

    state.cards.restore(&card.id).await?;

    get_card(state, session, id).await
}

/// Permanently delete one binned card
pub async fn purge_card(state: &AppState, session: &mut Session, id: String) -> Result<()> {
    let user = require_user(state, session).await?;
    let card = trashed_card(state, &user.id, &id).await?;

    state.cards.purge(&card.id).await?;
    Ok(())
}

/// Permanently delete every binned card; returns how many were removed
pub async fn empty_trash(state: &AppState, session: &mut Session) -> Result<u64> {
    let user = require_user(state, session).await?;

    state.cards.empty_trash(&user.id).await
}

/// An active card owned by `user_id`; other users' and binned cards read
/// as missing
pub(crate) async fn owned_card(state: &AppState, user_id: &str, id: &str) -> Result<Card> {
    state
        .cards
        .get_by_id(id)
        .await?
        .filter(|card| card.user_id == user_id && card.is_active)
        .ok_or_else(|| AppError::CardNotFound(id.to_string()))
}

/// Like [`owned_card`], but `CardLocked` while the session sees it masked
pub(crate) async fn unlocked_card(
    state: &AppState,
    session: &Session,
    user_id: &str,
    id: &str,
) -> Result<Card> {
    let card = owned_card(state, user_id, id).await?;
    let locks = state.locks.get_settings(user_id).await?;

    if is_concealed(&card, &locks, session) {
        tracing::debug!("Card {} is locked for this session", card.id);
        return Err(AppError::CardLocked(card.id));
    }

    Ok(card)
}

async fn trashed_card(state: &AppState, user_id: &str, id: &str) -> Result<Card> {
    state
        .cards
        .get_by_id(id)
        .await?
        .filter(|card| card.user_id == user_id && !card.is_active)
        .ok_or_else(|| AppError::CardNotFound(id.to_string()))
}
