//! User, follow and account endpoints.

use std::collections::HashSet;

use tracing::debug;

use crate::models::{
    AuthResponse, LoginRequest, PasswordChange, ProfileUpdate, RegisterData, Tweet, User, UserStats,
};

use super::{ApiClient, ApiError, ApiRequest};

impl ApiClient {
    // ===== Credentials =====

    /// Exchange username and password for a token pair and the user
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post("/users/login/")
            .json(&LoginRequest { username, password })?
            .without_recovery();
        self.send_json(request).await
    }

    /// Create an account; the server answers with tokens for the new user
    pub async fn register(&self, data: &RegisterData) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post("/users/register/")
            .json(data)?
            .without_recovery();
        self.send_json(request).await
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("/users/change_password/").json(&PasswordChange {
            old_password,
            new_password,
        })?;
        self.send_unit(request).await
    }

    // ===== Profiles =====

    /// The signed-in user ("who am I")
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get("/users/me/").await
    }

    pub async fn user(&self, user_id: i64) -> Result<User, ApiError> {
        self.get(&format!("/users/{}/", user_id)).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get("/users/").await
    }

    pub async fn user_stats(&self, user_id: i64) -> Result<UserStats, ApiError> {
        self.get(&format!("/users/{}/stats/", user_id)).await
    }

    /// Tweets by one user, newest first
    pub async fn user_tweets(&self, user_id: i64) -> Result<Vec<Tweet>, ApiError> {
        self.get(&format!("/users/{}/tweets/", user_id)).await
    }

    /// Edit the signed-in user's profile. Sent as multipart so an avatar
    /// image can ride along with the text fields.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User, ApiError> {
        let request = ApiRequest::put("/users/update_profile/").multipart(update.into_form_parts());
        self.send_json(request).await
    }

    // ===== Follows =====

    pub async fn following(&self) -> Result<Vec<User>, ApiError> {
        self.get("/users/following/").await
    }

    pub async fn followers(&self) -> Result<Vec<User>, ApiError> {
        self.get("/users/followers/").await
    }

    pub async fn follow(&self, user_id: i64) -> Result<(), ApiError> {
        self.send_unit(ApiRequest::post(format!("/users/{}/follow/", user_id)))
            .await
    }

    pub async fn unfollow(&self, user_id: i64) -> Result<(), ApiError> {
        self.send_unit(ApiRequest::delete(format!("/users/{}/unfollow/", user_id)))
            .await
    }

    /// Users worth following: everyone except `current_user_id` and the
    /// accounts already followed.
    pub async fn suggested_users(&self, current_user_id: i64) -> Result<Vec<User>, ApiError> {
        let (all, following) = futures::try_join!(self.list_users(), self.following())?;
        let suggestions = suggest_users(all, &following, current_user_id);
        debug!(count = suggestions.len(), "Suggested users computed");
        Ok(suggestions)
    }
}

/// Filter `all` down to accounts that are neither `current_user_id` nor
/// already in `following`, keeping the server's order.
pub fn suggest_users(all: Vec<User>, following: &[User], current_user_id: i64) -> Vec<User> {
    let followed: HashSet<i64> = following.iter().map(|u| u.id).collect();
    all.into_iter()
        .filter(|u| u.id != current_user_id && !followed.contains(&u.id))
        .collect()
}
