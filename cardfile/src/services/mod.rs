//! Services module
//!
//! Business logic services that coordinate between commands and repository.

pub mod app_config;
pub mod attachments;
pub mod auth;
pub mod cards;
pub mod locking;
pub mod settings;
pub mod tags;
pub mod users;

pub use app_config::AppConfigService;
pub use attachments::CardAttachmentService;
pub use auth::{AuthService, Redirect, Session, SessionCookie};
pub use cards::{CardService, OwnerPolicy};
pub use locking::{LockService, UpdateLockSettings};
pub use settings::{AppSettings, DatabaseConfiguration, LastUserInfo, SettingsService};
pub use tags::TagService;
pub use users::UserService;
