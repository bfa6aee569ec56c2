//! Card locking commands

use super::cards::owned_card;
use super::require_user;
use crate::app::AppState;
use crate::database::{Card, LockSettings};
use crate::error::{AppError, Result};
use crate::services::locking::conceal;
use crate::services::{Session, UpdateLockSettings};
use chrono::{Duration, Utc};

pub async fn get_lock_settings(state: &AppState, session: &mut Session) -> Result<LockSettings> {
    let user = require_user(state, session).await?;

    state.locks.get_settings(&user.id).await
}

pub async fn configure_locking(
    state: &AppState,
    session: &mut Session,
    req: UpdateLockSettings,
) -> Result<LockSettings> {
    let user = require_user(state, session).await?;

    state.locks.update_settings(&user.id, req).await
}

/// Lock a card. Any unlock this session held for it ends.
pub async fn lock_card(state: &AppState, session: &mut Session, id: String) -> Result<Card> {
    let user = require_user(state, session).await?;
    let locks = enabled_settings(state, &user.id).await?;
    let card = owned_card(state, &user.id, &id).await?;

    state.cards.set_locked(&card.id, true).await?;
    session.relock(&card.id);

    let card = owned_card(state, &user.id, &id).await?;
    Ok(conceal(card, &locks, session))
}

/// Check the lock password and return the card in full.
///
/// With `permanent` the card's lock is removed; otherwise this session may
/// keep reading and editing it for the configured auto-lock period.
pub async fn unlock_card(
    state: &AppState,
    session: &mut Session,
    id: String,
    lock_password: String,
    permanent: bool,
) -> Result<Card> {
    let user = require_user(state, session).await?;
    let locks = enabled_settings(state, &user.id).await?;
    let card = owned_card(state, &user.id, &id).await?;

    if !state.locks.verify_password(&user.id, &lock_password).await? {
        tracing::warn!("Wrong lock password for card {}", card.id);
        return Err(AppError::InvalidLockPassword);
    }

    if permanent {
        state.cards.set_locked(&card.id, false).await?;
        session.relock(&card.id);
        let card = owned_card(state, &user.id, &id).await?;
        return Ok(conceal(card, &locks, session));
    }

    session.grant_unlock(
        &card.id,
        Utc::now() + Duration::seconds(locks.auto_lock_seconds),
    );
    tracing::debug!(
        "Card {} unlocked for {} seconds",
        card.id,
        locks.auto_lock_seconds
    );

    // Revealed even when an auto-lock of 0 has already lapsed the grant
    Ok(card)
}

async fn enabled_settings(state: &AppState, user_id: &str) -> Result<LockSettings> {
    let locks = state.locks.get_settings(user_id).await?;
    if !locks.enabled {
        return Err(AppError::validation("card locking is not enabled"));
    }
    Ok(locks)
}
