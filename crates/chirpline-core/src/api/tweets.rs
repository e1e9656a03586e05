//! Tweet, like, retweet and comment endpoints.

use crate::models::{Comment, NewComment, NewTweet, Tweet};

use super::{ApiClient, ApiError, ApiRequest};

impl ApiClient {
    /// Tweets from the signed-in user and everyone they follow, newest first
    pub async fn feed(&self) -> Result<Vec<Tweet>, ApiError> {
        self.get("/tweets/feed/").await
    }

    /// Every tweet, newest first
    pub async fn list_tweets(&self) -> Result<Vec<Tweet>, ApiError> {
        self.get("/tweets/").await
    }

    pub async fn tweet(&self, tweet_id: i64) -> Result<Tweet, ApiError> {
        self.get(&format!("/tweets/{}/", tweet_id)).await
    }

    /// Publish a tweet. Sent as multipart so an image can be attached.
    pub async fn create_tweet(&self, tweet: NewTweet) -> Result<Tweet, ApiError> {
        let request = ApiRequest::post("/tweets/").multipart(tweet.into_form_parts());
        self.send_json(request).await
    }

    pub async fn like(&self, tweet_id: i64) -> Result<(), ApiError> {
        self.send_unit(ApiRequest::post(format!("/tweets/{}/like/", tweet_id)))
            .await
    }

    pub async fn unlike(&self, tweet_id: i64) -> Result<(), ApiError> {
        self.send_unit(ApiRequest::delete(format!("/tweets/{}/unlike/", tweet_id)))
            .await
    }

    pub async fn retweet(&self, tweet_id: i64) -> Result<(), ApiError> {
        self.send_unit(ApiRequest::post(format!("/tweets/{}/retweet/", tweet_id)))
            .await
    }

    pub async fn unretweet(&self, tweet_id: i64) -> Result<(), ApiError> {
        self.send_unit(ApiRequest::delete(format!("/tweets/{}/unretweet/", tweet_id)))
            .await
    }

    /// Comments on a tweet, newest first
    pub async fn comments(&self, tweet_id: i64) -> Result<Vec<Comment>, ApiError> {
        self.get(&format!("/tweets/{}/comments/", tweet_id)).await
    }

    pub async fn comment(&self, tweet_id: i64, content: &str) -> Result<Comment, ApiError> {
        let request = ApiRequest::post(format!("/tweets/{}/comment/", tweet_id))
            .json(&NewComment { content })?;
        self.send_json(request).await
    }
}
