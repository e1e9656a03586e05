//! Plain-text rendering of API results.

use chirpline_core::models::{Comment, Tweet, User, UserStats};
use chirpline_core::utils::{avatar_url, relative_time, truncate};

/// Bios longer than this are cut in list views
const BIO_PREVIEW_LENGTH: usize = 60;

pub fn print_usage() {
    println!(
        "\
Usage: chirpline <command> [args]

Account:
  login [username]        Sign in (password is prompted)
  register                Create an account
  logout                  Sign out and forget stored tokens
  whoami                  Show the signed-in user

Tweets:
  feed                    Tweets from you and the people you follow
  post <text>             Publish a tweet
  like <tweet-id>         Like a tweet
  retweet <tweet-id>      Retweet a tweet
  comments <tweet-id>     Show comments on a tweet
  comment <tweet-id> <text>
                          Comment on a tweet

People:
  follow <user-id>        Follow a user
  unfollow <user-id>      Stop following a user
  following               Users you follow
  suggested               Users you might want to follow
  profile [user-id]       Show a profile (defaults to you)

Environment:
  CHIRPLINE_ENV           development | production
  CHIRPLINE_API_URL       Override the API base URL
  CHIRPLINE_USERNAME      Username for `login`
  CHIRPLINE_PASSWORD      Password for `login`
  RUST_LOG                Log level for the log file (default: warn)"
    );
}

pub fn print_user(user: &User, media_origin: &str) {
    println!("{} {} (#{})", user.display_name(), user.handle(), user.id);
    if !user.email.is_empty() {
        println!("  email:  {}", user.email);
    }
    if let Some(bio) = user.bio.as_deref().filter(|b| !b.is_empty()) {
        println!("  bio:    {}", bio);
    }
    if let Some(url) = user.avatar_url(media_origin) {
        println!("  avatar: {}", url);
    }
}

pub fn print_user_list(users: &[User], empty_message: &str) {
    if users.is_empty() {
        println!("{}", empty_message);
        return;
    }
    for user in users {
        let bio = user
            .bio
            .as_deref()
            .map(|b| truncate(b, BIO_PREVIEW_LENGTH))
            .unwrap_or_default();
        println!("#{:<5} {:<24} {}", user.id, user.handle(), bio);
    }
}

pub fn print_tweets(tweets: &[Tweet], media_origin: &str) {
    if tweets.is_empty() {
        println!("Nothing here yet.");
        return;
    }
    for tweet in tweets {
        print_tweet(tweet, media_origin);
        println!();
    }
}

fn print_tweet(tweet: &Tweet, media_origin: &str) {
    println!(
        "#{} {} {} · {}",
        tweet.id,
        tweet.author.display_name(),
        tweet.author.handle(),
        relative_time(tweet.timestamp)
    );
    if !tweet.content.is_empty() {
        println!("  {}", tweet.content);
    }
    if let Some(url) = avatar_url(tweet.image.as_deref(), media_origin) {
        println!("  [image] {}", url);
    }
    if let Some(location) = tweet.location.as_deref().filter(|l| !l.is_empty()) {
        println!("  at {}", location);
    }
    println!(
        "  {} likes  {} retweets  {} replies",
        tweet.likes, tweet.retweets, tweet.replies
    );
}

pub fn print_comments(comments: &[Comment]) {
    if comments.is_empty() {
        println!("No comments yet.");
        return;
    }
    for comment in comments {
        println!(
            "{} · {}: {}",
            comment.author.handle(),
            relative_time(comment.created_at),
            comment.content
        );
    }
}

pub fn print_profile(user: &User, stats: &UserStats, tweets: &[Tweet], media_origin: &str) {
    print_user(user, media_origin);
    println!(
        "  {} tweets  {} following  {} followers",
        stats.tweets_count, stats.following_count, stats.followers_count
    );
    println!();
    print_tweets(tweets, media_origin);
}
