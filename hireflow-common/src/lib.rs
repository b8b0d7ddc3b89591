//! # Hireflow Common Library
//!
//! Shared code for the Hireflow applicant tracking service:
//! - Error type shared by every layer
//! - Bootstrap configuration resolution (CLI → ENV → TOML → defaults)
//! - Tracing subscriber setup
//! - SQLite schema, migrations and runtime settings
//! - Authentication primitives (password hashing, signed access tokens, roles)
//! - Event bus for server-sent events

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
