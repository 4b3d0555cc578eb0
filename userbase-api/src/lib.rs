//! # Userbase API Server Library
//!
//! Users, accounts and a global search index, each kept by independently
//! addressed actors, plus the session boundary that fronts them.
//!
//! ## Modules
//!
//! - `actors`: Actor directory, stubs and the user/account/system actors
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `login`: Login completion after an OAuth exchange
//! - `middleware`: Security headers
//! - `routes`: Session boundary route handlers

pub mod actors;
pub mod app;
pub mod config;
pub mod error;
pub mod login;
pub mod middleware;
pub mod routes;
