//! # Userbase Shared Library
//!
//! Storage, table models and billing logic shared by the userbase actors and
//! the API server.
//!
//! ## Module Organization
//!
//! - `ids`: actor kinds and actor ids
//! - `db`: per-actor SQLite stores and their schemas
//! - `models`: table models (profile, credentials, sessions, memberships, ...)
//! - `billing`: plans, payment engine and the subscription state machine
//! - `auth`: session ids and the session cookie

pub mod auth;
pub mod billing;
pub mod db;
pub mod ids;
pub mod models;

/// Current version of the userbase shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
