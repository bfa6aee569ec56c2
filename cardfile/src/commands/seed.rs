//! Sample data for a new account

use super::require_user;
use crate::app::AppState;
use crate::database::{Card, CreateCardRequest, TagRef};
use crate::error::Result;
use crate::services::Session;
use chrono::{Duration, Utc};
use serde::Serialize;

const DEFAULT_TAGS: [&str; 3] = ["work", "personal", "ideas"];

/// (title, content, age in days, tags)
const WELCOME_CARDS: [(&str, &str, i64, &[&str]); 3] = [
    (
        "Welcome to Cardfile",
        "This is your first card. Use cards to organise your thoughts, ideas and important information.",
        5,
        &["personal"],
    ),
    (
        "Project ideas",
        "A collection of project ideas for future development: web applications, mobile apps and desktop tools.",
        3,
        &["work", "ideas"],
    ),
    (
        "Learning resources",
        "Important learning resources and tutorials for building new skills.",
        1,
        &["work"],
    ),
];

#[derive(Debug, Serialize)]
pub struct SeedReport {
    pub tags: Vec<String>,
    pub cards: Vec<Card>,
    /// False when the user already had cards
    pub seeded: bool,
}

/// Create the default tags and, if the current user has no cards yet, a few
/// welcome cards
pub async fn seed(state: &AppState, session: &mut Session) -> Result<SeedReport> {
    let user = require_user(state, session).await?;

    let mut tags = Vec::with_capacity(DEFAULT_TAGS.len());
    for name in DEFAULT_TAGS {
        tags.push(state.tags.upsert(name).await?.name);
    }

    if !state.cards.get_by_user(&user.id).await?.is_empty() {
        tracing::info!("User {} already has cards; skipping sample cards", user.username);
        return Ok(SeedReport {
            tags,
            cards: Vec::new(),
            seeded: false,
        });
    }

    let now = Utc::now();
    let mut cards = Vec::with_capacity(WELCOME_CARDS.len());
    for (title, content, age_days, card_tags) in WELCOME_CARDS {
        let card = state
            .cards
            .add(CreateCardRequest {
                title: title.to_string(),
                content: Some(content.to_string()),
                created_at: Some(now - Duration::days(age_days)),
                user_id: Some(user.id.clone()),
                tags: card_tags.iter().map(|t| TagRef::name(*t)).collect(),
                ..Default::default()
            })
            .await?;
        cards.push(card);
    }

    tracing::info!("Seeded {} sample cards for {}", cards.len(), user.username);

    Ok(SeedReport {
        tags,
        cards,
        seeded: true,
    })
}
