use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::FormPart;

use super::{Upload, User};

/// Longest location the backend stores
pub const MAX_LOCATION_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Tweet {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub retweets: u64,
    #[serde(default)]
    pub replies: u64,
    pub author: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub author: User,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NewComment<'a> {
    pub content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TweetError {
    #[error("A tweet needs text or an image")]
    Empty,

    #[error("Location must be at most {} characters", MAX_LOCATION_LENGTH)]
    LocationTooLong,
}

/// A tweet being composed. Sent as multipart form data.
#[derive(Debug, Clone, Default)]
pub struct NewTweet {
    pub content: String,
    pub location: Option<String>,
    pub image: Option<Upload>,
}

impl NewTweet {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), TweetError> {
        if self.content.trim().is_empty() && self.image.is_none() {
            return Err(TweetError::Empty);
        }
        let location_len = self.location.as_ref().map(|l| l.chars().count()).unwrap_or(0);
        if location_len > MAX_LOCATION_LENGTH {
            return Err(TweetError::LocationTooLong);
        }
        Ok(())
    }

    pub(crate) fn into_form_parts(self) -> Vec<FormPart> {
        let mut parts = vec![FormPart::text("content", self.content)];
        if let Some(location) = self.location.filter(|l| !l.trim().is_empty()) {
            parts.push(FormPart::text("location", location));
        }
        if let Some(image) = self.image {
            parts.push(image.into_part("image"));
        }
        parts
    }
}
