//! Commands exposed to the host
//!
//! This module organizes commands into logical submodules:
//! - `auth`: Registration, login, logout and password changes
//! - `cards`: Card CRUD operations, search and the recycle bin
//! - `locking`: Card lock password and lock/unlock
//! - `tags`: Tag listing and maintenance
//! - `attachments`: Attachment upload and download
//! - `settings`: Settings file and database configuration
//! - `seed`: Sample data for a new account
//!
//! Every command takes the shared [`AppState`] and, when it needs a signed
//! in user, the caller's [`Session`].

pub mod attachments;
pub mod auth;
pub mod cards;
pub mod locking;
pub mod seed;
pub mod settings;
pub mod tags;

use crate::app::AppState;
use crate::database::User;
use crate::error::{AppError, Result};
use crate::services::Session;
use serde::Serialize;

pub use attachments::*;
pub use auth::*;
pub use cards::*;
pub use locking::*;
pub use seed::*;
pub use settings::*;
pub use tags::*;

/// The signed-in user, or `NotAuthenticated`
pub(crate) async fn require_user(state: &AppState, session: &mut Session) -> Result<User> {
    state
        .auth
        .get_current_user(session)
        .await?
        .ok_or(AppError::NotAuthenticated)
}

/// Get application information
pub async fn get_app_info(state: &AppState) -> Result<AppInfo> {
    Ok(AppInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        app_data_dir: state.app_data_dir.to_string_lossy().to_string(),
        database_path: state.db_path.to_string_lossy().to_string(),
    })
}

/// Application information structure
#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub version: String,
    pub app_data_dir: String,
    pub database_path: String,
}
