//! Application configuration constants
//!
//! Central location for validation boundaries, resource limits and
//! session windows used throughout the application.

// ===== Card Limits =====

/// Maximum card title length in characters
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum card content length in characters
pub const MAX_CONTENT_LENGTH: usize = 2000;

/// Maximum tag name length in characters
pub const MAX_TAG_NAME_LENGTH: usize = 100;

// ===== Card Locking =====

/// Seconds an unlocked card stays readable before it locks again
pub const DEFAULT_AUTO_LOCK_SECONDS: i64 = 30;

/// Leading title characters left visible on a locked card
pub const DEFAULT_MASK_VISIBLE_CHARS: i64 = 5;

/// Replaces each hidden title character
pub const MASK_CHAR: char = '\u{2022}';

// ===== Account Limits =====

/// Maximum username length in characters
pub const MAX_USERNAME_LENGTH: usize = 100;

/// Maximum e-mail length in characters
pub const MAX_EMAIL_LENGTH: usize = 200;

// ===== Attachment Limits =====

/// Maximum attachment payload (10 MiB)
pub const MAX_ATTACHMENT_SIZE: i64 = 10 * 1024 * 1024;

/// Maximum stored file name length
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// MIME types accepted for card attachments
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

// ===== Sessions =====

/// A remembered login is honoured for this many hours after it happened
pub const REMEMBER_WINDOW_HOURS: i64 = 24;

/// Lifetime of a non-remembered session cookie in minutes
pub const SESSION_COOKIE_MINUTES: i64 = 30;

/// Session cookie name issued by the host
pub const SESSION_COOKIE_NAME: &str = "cardfile_session";

/// Where the host sends the user after logout
pub const LOGIN_PATH: &str = "/login";

// ===== Settings File =====

/// Settings file name inside the data directory
pub const SETTINGS_FILE_NAME: &str = "appsettings.json";

/// Top-level key holding this application's settings section
pub const SETTINGS_SECTION: &str = "cardfileSettings";

/// Language used when none is configured
pub const DEFAULT_LANGUAGE: &str = "es";

/// Database type used when none is configured
pub const DEFAULT_DATABASE_TYPE: &str = "SQLite";

/// Connection string used when none is configured
pub const DEFAULT_CONNECTION_STRING: &str = "Data Source=cardfile.db";
