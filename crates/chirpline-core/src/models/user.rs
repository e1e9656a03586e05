use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::FormPart;
use crate::utils::avatar_url;

use super::Upload;

/// Minimum password length accepted at sign-up
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum bio length shown in the profile editor
pub const MAX_BIO_LENGTH: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub followers_count: Option<u64>,
    #[serde(default)]
    pub following_count: Option<u64>,
    #[serde(default)]
    pub tweets_count: Option<u64>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Full name, falling back to the username when no name is set
    pub fn display_name(&self) -> String {
        let name = self.full_name();
        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }

    pub fn handle(&self) -> String {
        format!("@{}", self.username)
    }

    pub fn avatar_url(&self, media_origin: &str) -> Option<String> {
        avatar_url(self.avatar.as_deref(), media_origin)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserStats {
    pub tweets_count: u64,
    pub following_count: u64,
    pub followers_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("All fields are required")]
    MissingField,

    #[error("Password must be at least {} characters", MIN_PASSWORD_LENGTH)]
    PasswordTooShort,

    #[error("Passwords do not match")]
    PasswordMismatch,
}

#[derive(Clone, Serialize)]
pub struct RegisterData {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl std::fmt::Debug for RegisterData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterData")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("bio", &self.bio)
            .finish()
    }
}

impl RegisterData {
    /// Check the form before it is sent: every field filled in, the
    /// password long enough and typed the same way twice.
    pub fn validate(&self, confirm_password: &str) -> Result<(), RegistrationError> {
        let required = [
            &self.username,
            &self.email,
            &self.password,
            &self.first_name,
            &self.last_name,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err(RegistrationError::MissingField);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(RegistrationError::PasswordTooShort);
        }
        if self.password != confirm_password {
            return Err(RegistrationError::PasswordMismatch);
        }
        Ok(())
    }
}

/// Partial profile edit. Only the fields that are `Some` are sent.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<Upload>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.bio.is_none()
            && self.avatar.is_none()
    }

    pub fn bio_too_long(&self) -> bool {
        self.bio
            .as_ref()
            .map(|b| b.chars().count() > MAX_BIO_LENGTH)
            .unwrap_or(false)
    }

    pub(crate) fn into_form_parts(self) -> Vec<FormPart> {
        let mut parts = Vec::new();
        let text_fields = [
            ("first_name", self.first_name),
            ("last_name", self.last_name),
            ("email", self.email),
            ("bio", self.bio),
        ];
        for (name, value) in text_fields {
            if let Some(value) = value {
                parts.push(FormPart::text(name, value));
            }
        }
        if let Some(avatar) = self.avatar {
            parts.push(avatar.into_part("avatar"));
        }
        parts
    }
}

#[derive(Serialize)]
pub struct PasswordChange<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}
