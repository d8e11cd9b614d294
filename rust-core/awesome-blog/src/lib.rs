//! # Awesome Blog
//!
//! A small multi-user blog served by `awesome-core`: visitors read posts,
//! registered users comment, administrators manage posts, comments and
//! accounts.
//!
//! Pages are rendered from minijinja templates, records live in SQLite and
//! sessions are carried by a signed `awesession` cookie.

pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod templates;

pub use app::build_server;
pub use config::AppConfig;
pub use error::{Error, Result};
