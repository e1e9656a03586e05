//! Core library for Chirpline, a client for the Chirpline social feed API.
//!
//! The pieces, leaf-first:
//!
//! - [`auth::TokenStore`]: persistence for the access/refresh bearer pair
//! - [`api::ApiClient`]: the single request pipeline, which attaches the
//!   bearer token and recovers once from a 401 by refreshing it
//! - [`auth::SessionController`]: authentication state and its transitions
//!
//! Everything else (models, avatar resolution, formatting helpers) exists to
//! support callers building a UI on top of those three.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, ClientConfig};
pub use auth::{AuthEvent, RegisterPolicy, SessionController, SessionState, TokenStore};
pub use config::Config;
