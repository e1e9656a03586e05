//! REST API client module for the Chirpline backend.
//!
//! This module provides the `ApiClient`, the one request pipeline every API
//! call goes through. It attaches the stored bearer token to outgoing
//! requests and, when a request is rejected with 401, exchanges the refresh
//! token for a new access token and resubmits the request once.
//!
//! Endpoint bindings are split by resource: `users` and `tweets`.

pub mod client;
pub mod error;
pub mod request;
mod tweets;
mod users;

pub use client::{ApiClient, ClientConfig};
pub use error::{ApiError, ValidationErrors};
pub use request::{ApiRequest, FormPart, RequestBody};
pub use users::suggest_users;
