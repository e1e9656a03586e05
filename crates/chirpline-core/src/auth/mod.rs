//! Authentication module for managing sessions and stored tokens.
//!
//! This module provides:
//! - `TokenStore`: persistence for the access/refresh token pair, with
//!   in-memory, file and OS keychain backends
//! - `SessionController`: the authentication state machine
//!   (`Loading → Authenticated | Unauthenticated`) and its transitions
//! - `AuthEvent`: notifications raised by the API client, such as a failed
//!   token refresh that requires signing in again

pub mod session;
pub mod token_store;

pub use session::{RegisterPolicy, SessionController, SessionState};
pub use token_store::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore, TokenStoreError,
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};

/// Events raised by the API client for whoever drives navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The refresh token was rejected; both tokens are gone and the user
    /// has to sign in again.
    SignInRequired,
}
