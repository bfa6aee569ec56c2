//! Account and session commands

use crate::app::AppState;
use crate::database::User;
use crate::error::{AppError, Result};
use crate::services::{Redirect, Session, SessionCookie};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub cookie: SessionCookie,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub redirect: Redirect,
    pub cookie: SessionCookie,
}

/// Create an account
pub async fn register(
    state: &AppState,
    username: String,
    email: Option<String>,
    password: String,
) -> Result<bool> {
    Ok(state
        .auth
        .register(&username, email.as_deref().unwrap_or_default(), &password)
        .await)
}

/// Sign in. Bad credentials are reported without saying which part was wrong.
pub async fn login(
    state: &AppState,
    session: &mut Session,
    username: String,
    password: String,
    remember: bool,
) -> Result<LoginResponse> {
    let user = state
        .auth
        .login(session, &username, &password, remember)
        .await?
        .ok_or_else(|| AppError::Generic("Invalid username or password".to_string()))?;

    Ok(LoginResponse {
        user,
        cookie: state.auth.session_cookie(remember),
    })
}

pub async fn logout(state: &AppState, session: &mut Session) -> Result<LogoutResponse> {
    let redirect = state.auth.logout(session).await?;

    Ok(LogoutResponse {
        redirect,
        cookie: SessionCookie::expired(),
    })
}

/// The signed-in user, if any
pub async fn whoami(state: &AppState, session: &mut Session) -> Result<Option<User>> {
    state.auth.get_current_user(session).await
}

pub async fn change_password(
    state: &AppState,
    session: &mut Session,
    current_password: String,
    new_password: String,
) -> Result<bool> {
    if !state.auth.is_authenticated(session).await? {
        return Err(AppError::NotAuthenticated);
    }

    Ok(state
        .auth
        .change_password(session, &current_password, &new_password)
        .await)
}
