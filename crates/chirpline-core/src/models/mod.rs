//! Data models for Chirpline entities.
//!
//! This module contains the data structures exchanged with the API:
//!
//! - `User`, `UserStats`: accounts and their follower/tweet counts
//! - `Tweet`, `Comment`: feed entries and their replies
//! - `TokenPair` and the auth request/response shapes
//! - Form payloads: `RegisterData`, `ProfileUpdate`, `NewTweet`, `Upload`

pub mod auth;
pub mod tweet;
pub mod upload;
pub mod user;

pub use auth::{AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, TokenPair};
pub use tweet::{Comment, NewComment, NewTweet, Tweet, TweetError, MAX_LOCATION_LENGTH};
pub use upload::Upload;
pub use user::{
    PasswordChange, ProfileUpdate, RegisterData, RegistrationError, User, UserStats,
    MAX_BIO_LENGTH, MIN_PASSWORD_LENGTH,
};
