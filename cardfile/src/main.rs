//! Cardfile CLI
//!
//! Headless host for the card services. Every command prints its result as
//! JSON on stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cardfile::app::AppState;
use cardfile::commands;
use cardfile::services::{Session, UpdateLockSettings};

#[derive(Parser, Debug)]
#[command(name = "cardfile")]
#[command(version, about = "Personal card and note manager", long_about = None)]
struct Cli {
    /// Directory holding the settings file and the default database
    #[arg(long, env = "CARDFILE_DATA_DIR", default_value = "./cardfile-data", global = true)]
    data_dir: PathBuf,

    /// Emit structured JSON log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Register {
        username: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "CARDFILE_PASSWORD")]
        password: String,
    },
    /// Sign in; with --remember the login is kept for 24 hours
    Login {
        username: String,
        #[arg(long, env = "CARDFILE_PASSWORD")]
        password: String,
        #[arg(long)]
        remember: bool,
    },
    /// Sign out and forget the remembered login
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Change the signed-in user's password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long = "new")]
        new_password: String,
    },
    /// Show version and data locations
    Info,
    /// Manage cards
    Card {
        #[command(subcommand)]
        command: CardCommand,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },
    /// Manage card attachments
    Attach {
        #[command(subcommand)]
        command: AttachCommand,
    },
    /// Card lock password and auto-lock preferences
    Locking {
        #[command(subcommand)]
        command: LockingCommand,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Create default tags and welcome cards for the signed-in user
    Seed,
}

#[derive(Subcommand, Debug)]
enum CardCommand {
    Add {
        title: String,
        #[arg(long)]
        content: Option<String>,
        /// Tag name; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    List {
        #[arg(long)]
        tag: Option<String>,
    },
    Show {
        id: String,
        /// Reveal a locked card
        #[arg(long, env = "CARDFILE_LOCK_PASSWORD")]
        lock_password: Option<String>,
    },
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// Remove the card's content
        #[arg(long, conflicts_with = "content")]
        clear_content: bool,
        /// Replace the tag set; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Remove every tag from the card
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },
    /// Delete permanently, skipping the recycle bin
    Rm {
        id: String,
    },
    Search {
        query: String,
    },
    /// Move a card to the recycle bin
    Trash {
        id: String,
    },
    /// List the recycle bin
    Bin,
    /// Take a card back out of the recycle bin
    Restore {
        id: String,
    },
    /// Permanently delete a card from the recycle bin
    Purge {
        id: String,
    },
    /// Permanently delete everything in the recycle bin
    EmptyBin,
    Lock {
        id: String,
    },
    /// Remove a card's lock
    Unlock {
        id: String,
        #[arg(long, env = "CARDFILE_LOCK_PASSWORD")]
        lock_password: String,
    },
}

#[derive(Subcommand, Debug)]
enum LockingCommand {
    Show,
    /// Change locking preferences; unspecified options keep their value
    Set {
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
        /// New lock password
        #[arg(long)]
        password: Option<String>,
        /// Current lock password, to replace it or turn locking off
        #[arg(long, env = "CARDFILE_LOCK_PASSWORD")]
        current_password: Option<String>,
        #[arg(long)]
        auto_lock_seconds: Option<i64>,
        /// Title characters left visible on locked cards
        #[arg(long)]
        mask_chars: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum TagCommand {
    List,
    /// Rename a tag given by id or name
    Rename { tag: String, new_name: String },
    Rm { tag: String },
}

#[derive(Subcommand, Debug)]
enum AttachCommand {
    Add {
        card_id: String,
        path: PathBuf,
        /// MIME type; guessed from the extension when omitted
        #[arg(long)]
        content_type: Option<String>,
    },
    List {
        card_id: String,
    },
    /// Save an attachment to disk
    Get {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Rm {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    Language {
        language: String,
    },
    /// Takes effect on next start
    Database {
        #[arg(long, default_value = "SQLite")]
        database_type: String,
        connection_string: String,
    },
}

/// Initialise the global tracing subscriber, writing to stderr.
fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing("cardfile=info,warn", cli.log_json);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting cardfile");

    let state = AppState::initialize(&cli.data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", cli.data_dir.display()))?;

    let result = run(&state, cli.command).await;
    state.shutdown().await;

    result
}

async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    // Restored from the remembered login, if any
    let mut session = Session::new();

    match command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let registered = commands::register(state, username, email, password).await?;
            print_json(&json!({ "registered": registered }))?;
            if !registered {
                anyhow::bail!("registration failed: username taken or input invalid");
            }
        }
        Command::Login {
            username,
            password,
            remember,
        } => {
            let response =
                commands::login(state, &mut session, username, password, remember).await?;
            print_json(&response)?;
        }
        Command::Logout => print_json(&commands::logout(state, &mut session).await?)?,
        Command::Whoami => print_json(&commands::whoami(state, &mut session).await?)?,
        Command::Passwd {
            current,
            new_password,
        } => {
            let changed =
                commands::change_password(state, &mut session, current, new_password).await?;
            print_json(&json!({ "changed": changed }))?;
            if !changed {
                anyhow::bail!("password not changed");
            }
        }
        Command::Info => print_json(&commands::get_app_info(state).await?)?,
        Command::Card { command } => run_card(state, &mut session, command).await?,
        Command::Tag { command } => match command {
            TagCommand::List => print_json(&commands::list_tags(state, &mut session).await?)?,
            TagCommand::Rename { tag, new_name } => print_json(
                &commands::rename_tag(state, &mut session, tag, new_name).await?,
            )?,
            TagCommand::Rm { tag } => {
                commands::delete_tag(state, &mut session, tag).await?;
                print_json(&json!({ "deleted": true }))?;
            }
        },
        Command::Attach { command } => run_attach(state, &mut session, command).await?,
        Command::Locking { command } => match command {
            LockingCommand::Show => {
                print_json(&commands::get_lock_settings(state, &mut session).await?)?
            }
            LockingCommand::Set {
                enable,
                disable,
                password,
                current_password,
                auto_lock_seconds,
                mask_chars,
            } => {
                let enabled = if enable {
                    true
                } else if disable {
                    false
                } else {
                    commands::get_lock_settings(state, &mut session).await?.enabled
                };
                let req = UpdateLockSettings {
                    enabled,
                    password,
                    current_password,
                    auto_lock_seconds,
                    mask_visible_chars: mask_chars,
                };
                print_json(&commands::configure_locking(state, &mut session, req).await?)?
            }
        },
        Command::Config { command } => match command {
            ConfigCommand::Show => print_json(&commands::show_settings(state).await?)?,
            ConfigCommand::Language { language } => {
                print_json(&commands::set_language(state, language).await?)?
            }
            ConfigCommand::Database {
                database_type,
                connection_string,
            } => print_json(
                &commands::set_database(state, database_type, connection_string).await?,
            )?,
        },
        Command::Seed => print_json(&commands::seed(state, &mut session).await?)?,
    }

    Ok(())
}

async fn run_card(
    state: &AppState,
    session: &mut Session,
    command: CardCommand,
) -> anyhow::Result<()> {
    match command {
        CardCommand::Add {
            title,
            content,
            tags,
        } => print_json(&commands::create_card(state, session, title, content, tags).await?),
        CardCommand::List { tag } => print_json(&commands::list_cards(state, session, tag).await?),
        CardCommand::Show { id, lock_password } => match lock_password {
            Some(password) => print_json(
                &commands::unlock_card(state, session, id, password, false).await?,
            ),
            None => print_json(&commands::get_card(state, session, id).await?),
        },
        CardCommand::Edit {
            id,
            title,
            content,
            clear_content,
            tags,
            clear_tags,
        } => {
            let content = if clear_content {
                Some(String::new())
            } else {
                content
            };
            let tags = if clear_tags {
                Some(Vec::new())
            } else if tags.is_empty() {
                None
            } else {
                Some(tags)
            };
            print_json(&commands::update_card(state, session, id, title, content, tags).await?)
        }
        CardCommand::Rm { id } => {
            commands::delete_card(state, session, id).await?;
            print_json(&json!({ "deleted": true }))
        }
        CardCommand::Search { query } => {
            print_json(&commands::search_cards(state, session, query).await?)
        }
        CardCommand::Trash { id } => {
            commands::trash_card(state, session, id).await?;
            print_json(&json!({ "trashed": true }))
        }
        CardCommand::Bin => print_json(&commands::list_trash(state, session).await?),
        CardCommand::Restore { id } => {
            print_json(&commands::restore_card(state, session, id).await?)
        }
        CardCommand::Purge { id } => {
            commands::purge_card(state, session, id).await?;
            print_json(&json!({ "purged": true }))
        }
        CardCommand::EmptyBin => {
            let purged = commands::empty_trash(state, session).await?;
            print_json(&json!({ "purged": purged }))
        }
        CardCommand::Lock { id } => print_json(&commands::lock_card(state, session, id).await?),
        CardCommand::Unlock { id, lock_password } => print_json(
            &commands::unlock_card(state, session, id, lock_password, true).await?,
        ),
    }
}

async fn run_attach(
    state: &AppState,
    session: &mut Session,
    command: AttachCommand,
) -> anyhow::Result<()> {
    match command {
        AttachCommand::Add {
            card_id,
            path,
            content_type,
        } => print_json(
            &commands::add_attachment(state, session, card_id, path, content_type).await?,
        ),
        AttachCommand::List { card_id } => {
            print_json(&commands::list_attachments(state, session, card_id).await?)
        }
        AttachCommand::Get { id, output } => {
            print_json(&commands::get_attachment(state, session, id, output).await?)
        }
        AttachCommand::Rm { id } => {
            commands::delete_attachment(state, session, id).await?;
            print_json(&json!({ "deleted": true }))
        }
    }
}
