//! Cardfile library
//!
//! This library exposes the core functionality of Cardfile for testing
//! and for hosts other than the bundled command line.

pub mod app;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod events;
pub mod services;
