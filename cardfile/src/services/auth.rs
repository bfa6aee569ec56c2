//! Authentication service
//!
//! Login state is carried in a caller-owned [`Session`], one per request or
//! connection. Changes are announced on [`AuthEvents`]. A remembered login
//! is honoured from the settings file for [`REMEMBER_WINDOW_HOURS`].

use crate::config::{
    LOGIN_PATH, REMEMBER_WINDOW_HOURS, SESSION_COOKIE_MINUTES, SESSION_COOKIE_NAME,
};
use crate::crypto;
use crate::database::{NewUser, User};
use crate::error::Result;
use crate::events::{AuthEvent, AuthEvents, UserSummary};
use crate::services::settings::{LastUserInfo, SettingsService};
use crate::services::users::UserService;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Per-request authentication context
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<User>,
    /// Card id -> moment its unlock lapses
    unlocked: HashMap<String, DateTime<Utc>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Let this session read a locked card until `until`
    pub fn grant_unlock(&mut self, card_id: &str, until: DateTime<Utc>) {
        self.unlocked.insert(card_id.to_string(), until);
    }

    pub fn is_unlocked(&self, card_id: &str) -> bool {
        self.unlocked
            .get(card_id)
            .is_some_and(|until| *until > Utc::now())
    }

    pub fn relock(&mut self, card_id: &str) {
        self.unlocked.remove(card_id);
    }

    fn sign_out(&mut self) -> Option<User> {
        self.unlocked.clear();
        self.user.take()
    }
}

/// Where the host should send the client next
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub location: String,
}

/// Cookie the host issues for a signed-in session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionCookie {
    pub name: String,
    pub max_age_seconds: i64,
    /// Survives a browser restart
    pub persistent: bool,
}

impl SessionCookie {
    pub fn new(remember: bool) -> Self {
        let max_age = if remember {
            Duration::hours(REMEMBER_WINDOW_HOURS)
        } else {
            Duration::minutes(SESSION_COOKIE_MINUTES)
        };

        Self {
            name: SESSION_COOKIE_NAME.to_string(),
            max_age_seconds: max_age.num_seconds(),
            persistent: remember,
        }
    }

    /// Cookie that clears the session on the client
    pub fn expired() -> Self {
        Self {
            name: SESSION_COOKIE_NAME.to_string(),
            max_age_seconds: 0,
            persistent: false,
        }
    }

    /// `Set-Cookie` header value carrying `value`
    pub fn header_value(&self, value: &str) -> String {
        let mut header = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.name, value
        );
        if self.persistent || self.max_age_seconds == 0 {
            header.push_str(&format!("; Max-Age={}", self.max_age_seconds));
        }
        header
    }
}

/// Service for login, logout and registration
#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    settings: SettingsService,
    events: AuthEvents,
}

impl AuthService {
    pub fn new(users: UserService, settings: SettingsService, events: AuthEvents) -> Self {
        Self {
            users,
            settings,
            events,
        }
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    /// Verify credentials and sign the session in.
    ///
    /// Unknown users, inactive users and wrong passwords all give `None`.
    pub async fn login(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
        remember: bool,
    ) -> Result<Option<User>> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Ok(None);
        }

        let user = match self.users.get_by_username(username).await? {
            Some(user) if user.is_active => user,
            _ => {
                tracing::warn!("Login failed for: {}", username);
                return Ok(None);
            }
        };

        if !crypto::verify_password(password, &user.password_hash) {
            tracing::warn!("Login failed for: {}", username);
            return Ok(None);
        }

        self.settings
            .update_last_user(LastUserInfo {
                username: user.username.clone(),
                email: user.email.clone().unwrap_or_default(),
                remember_credentials: remember,
                last_login: Some(Utc::now()),
            })
            .await?;

        session.sign_out();
        session.user = Some(user.clone());

        tracing::info!("User logged in: {}", user.username);

        self.events.emit(AuthEvent::AuthStateChanged {
            user: Some(UserSummary::from(&user)),
            is_authenticated: true,
        });

        Ok(Some(user))
    }

    /// Create an active account. False when the name is taken or input is blank.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> bool {
        if username.trim().is_empty() || password.trim().is_empty() {
            return false;
        }

        match self.try_register(username, email, password).await {
            Ok(created) => created,
            Err(e) => {
                tracing::error!("Registration failed for {}: {}", username, e);
                false
            }
        }
    }

    async fn try_register(&self, username: &str, email: &str, password: &str) -> Result<bool> {
        if self.users.get_by_username(username).await?.is_some() {
            tracing::warn!("Username already taken: {}", username);
            return Ok(false);
        }

        let email = email.trim();
        let user = self
            .users
            .add(NewUser {
                username: username.to_string(),
                email: (!email.is_empty()).then(|| email.to_string()),
                password_hash: crypto::hash_password(password)?,
                is_active: true,
                ..Default::default()
            })
            .await?;

        tracing::info!("User registered: {}", user.username);

        Ok(true)
    }

    /// Sign out and forget the remembered login
    pub async fn logout(&self, session: &mut Session) -> Result<Redirect> {
        if let Some(user) = session.sign_out() {
            tracing::info!("User logged out: {}", user.username);
        }

        self.settings.update_last_user(LastUserInfo::empty()).await?;

        self.events.emit(AuthEvent::AuthStateChanged {
            user: None,
            is_authenticated: false,
        });

        Ok(Redirect {
            location: LOGIN_PATH.to_string(),
        })
    }

    /// The signed-in user, restoring a remembered login when still fresh
    pub async fn get_current_user(&self, session: &mut Session) -> Result<Option<User>> {
        if let Some(user) = session.user.as_ref() {
            if user.is_active {
                return Ok(Some(user.clone()));
            }

            tracing::warn!("Dropping inactive user from session: {}", user.username);
            session.sign_out();
            return Ok(None);
        }

        let Some(last_user) = self.settings.get_last_user().await else {
            return Ok(None);
        };

        if !last_user.remember_credentials || last_user.username.is_empty() {
            return Ok(None);
        }

        let cutoff = Utc::now() - Duration::hours(REMEMBER_WINDOW_HOURS);
        if last_user.last_login.map_or(true, |at| at <= cutoff) {
            tracing::debug!("Remembered login expired for: {}", last_user.username);
            return Ok(None);
        }

        match self.users.get_by_username(&last_user.username).await? {
            Some(user) if user.is_active => {
                tracing::debug!("Restored remembered login: {}", user.username);
                session.user = Some(user.clone());
                Ok(Some(user))
            }
            _ => Ok(None),
        }
    }

    pub async fn is_authenticated(&self, session: &mut Session) -> Result<bool> {
        Ok(self.get_current_user(session).await?.is_some())
    }

    /// Replace the current user's password after checking the old one
    pub async fn change_password(
        &self,
        session: &mut Session,
        current_password: &str,
        new_password: &str,
    ) -> bool {
        if new_password.trim().is_empty() {
            return false;
        }

        match self
            .try_change_password(session, current_password, new_password)
            .await
        {
            Ok(changed) => changed,
            Err(e) => {
                tracing::error!("Password change failed: {}", e);
                false
            }
        }
    }

    async fn try_change_password(
        &self,
        session: &mut Session,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool> {
        let Some(user) = self.get_current_user(session).await? else {
            return Ok(false);
        };

        if !self
            .users
            .validate_password(&user.username, current_password)
            .await?
        {
            tracing::warn!("Password change rejected for: {}", user.username);
            return Ok(false);
        }

        let hash = crypto::hash_password(new_password)?;
        if !self.users.set_password_hash(&user.id, &hash).await? {
            return Ok(false);
        }

        if let Some(session_user) = session.user.as_mut() {
            session_user.password_hash = hash;
        }

        Ok(true)
    }

    /// Cookie policy for a fresh login
    pub fn session_cookie(&self, remember: bool) -> SessionCookie {
        SessionCookie::new(remember)
    }
}
