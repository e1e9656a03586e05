//! Command parsing and execution.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, warn};

use chirpline_core::models::{NewTweet, RegisterData};
use chirpline_core::{Config, SessionController};

use crate::output;

/// Hint printed when a command needs a signed-in session
const SIGN_IN_HINT: &str = "Not signed in. Run `chirpline login` first.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: Option<String> },
    Register,
    Logout,
    WhoAmI,
    Feed,
    Post { text: String },
    Like { tweet_id: i64 },
    Retweet { tweet_id: i64 },
    Comments { tweet_id: i64 },
    Comment { tweet_id: i64, text: String },
    Follow { user_id: i64 },
    Unfollow { user_id: i64 },
    Following,
    Suggested,
    Profile { user_id: Option<i64> },
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        let command = match name.as_str() {
            "login" => Command::Login {
                username: rest.first().cloned(),
            },
            "register" => Command::Register,
            "logout" => Command::Logout,
            "whoami" => Command::WhoAmI,
            "feed" => Command::Feed,
            "post" => Command::Post {
                text: join_text(rest, "post")?,
            },
            "like" => Command::Like {
                tweet_id: parse_id(rest.first(), "tweet")?,
            },
            "retweet" => Command::Retweet {
                tweet_id: parse_id(rest.first(), "tweet")?,
            },
            "comments" => Command::Comments {
                tweet_id: parse_id(rest.first(), "tweet")?,
            },
            "comment" => Command::Comment {
                tweet_id: parse_id(rest.first(), "tweet")?,
                text: join_text(rest.get(1..).unwrap_or_default(), "comment")?,
            },
            "follow" => Command::Follow {
                user_id: parse_id(rest.first(), "user")?,
            },
            "unfollow" => Command::Unfollow {
                user_id: parse_id(rest.first(), "user")?,
            },
            "following" => Command::Following,
            "suggested" => Command::Suggested,
            "profile" => Command::Profile {
                user_id: rest
                    .first()
                    .map(|arg| parse_id(Some(arg), "user"))
                    .transpose()?,
            },
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("Unknown command: {}", other),
        };
        Ok(command)
    }

    fn needs_session(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. } | Command::Register | Command::Logout | Command::Help
        )
    }
}

fn parse_id(arg: Option<&String>, what: &str) -> Result<i64> {
    let raw = arg.ok_or_else(|| anyhow!("Missing {} id", what))?;
    raw.parse()
        .map_err(|_| anyhow!("Invalid {} id: {}", what, raw))
}

fn join_text(words: &[String], command: &str) -> Result<String> {
    let text = words.join(" ");
    if text.trim().is_empty() {
        bail!("`{}` needs some text", command);
    }
    Ok(text)
}

pub async fn run(command: Command, session: &SessionController, config: &mut Config) -> Result<()> {
    let needs_session = command.needs_session();
    if needs_session && !session.is_authenticated() {
        println!("{}", SIGN_IN_HINT);
        return Ok(());
    }

    let result = execute(command, session, config).await;

    // A refresh that failed mid-command has already cleared the tokens
    if needs_session && result.is_err() && session.api().tokens().load_access().is_none() {
        println!("{}", SIGN_IN_HINT);
    }
    result
}

async fn execute(command: Command, session: &SessionController, config: &mut Config) -> Result<()> {
    let api = session.api();
    let media_origin = config.media_origin();

    match command {
        Command::Login { username } => login(session, config, username).await,
        Command::Register => register(session).await,
        Command::Logout => {
            session.logout();
            println!("Signed out.");
            Ok(())
        }
        Command::WhoAmI => {
            let user = session
                .user()
                .ok_or_else(|| anyhow!("No user in session"))?;
            output::print_user(&user, &media_origin);
            Ok(())
        }
        Command::Feed => {
            let tweets = api.feed().await?;
            output::print_tweets(&tweets, &media_origin);
            Ok(())
        }
        Command::Post { text } => {
            let tweet = NewTweet::text(text);
            tweet.validate()?;
            let created = api.create_tweet(tweet).await?;
            println!("Posted tweet #{}.", created.id);
            Ok(())
        }
        Command::Like { tweet_id } => {
            api.like(tweet_id).await?;
            println!("Liked tweet #{}.", tweet_id);
            Ok(())
        }
        Command::Retweet { tweet_id } => {
            api.retweet(tweet_id).await?;
            println!("Retweeted tweet #{}.", tweet_id);
            Ok(())
        }
        Command::Comments { tweet_id } => {
            let comments = api.comments(tweet_id).await?;
            output::print_comments(&comments);
            Ok(())
        }
        Command::Comment { tweet_id, text } => {
            let comment = api.comment(tweet_id, &text).await?;
            println!("Added comment #{} to tweet #{}.", comment.id, tweet_id);
            Ok(())
        }
        Command::Follow { user_id } => {
            api.follow(user_id).await?;
            println!("Following user #{}.", user_id);
            Ok(())
        }
        Command::Unfollow { user_id } => {
            api.unfollow(user_id).await?;
            println!("Unfollowed user #{}.", user_id);
            Ok(())
        }
        Command::Following => {
            let users = api.following().await?;
            output::print_user_list(&users, "You are not following anyone yet.");
            Ok(())
        }
        Command::Suggested => {
            let me = session
                .user()
                .ok_or_else(|| anyhow!("No user in session"))?;
            let users = api.suggested_users(me.id).await?;
            output::print_user_list(&users, "No suggestions right now.");
            Ok(())
        }
        Command::Profile { user_id } => {
            let user_id = match user_id.or_else(|| session.user().map(|u| u.id)) {
                Some(id) => id,
                None => bail!("No user in session"),
            };
            let (user, stats, tweets) = futures::try_join!(
                api.user(user_id),
                api.user_stats(user_id),
                api.user_tweets(user_id)
            )?;
            output::print_profile(&user, &stats, &tweets, &media_origin);
            Ok(())
        }
        Command::Help => {
            output::print_usage();
            Ok(())
        }
    }
}

async fn login(session: &SessionController, config: &mut Config, username: Option<String>) -> Result<()> {
    let username = match username
        .or_else(|| std::env::var("CHIRPLINE_USERNAME").ok())
        .filter(|u| !u.trim().is_empty())
    {
        Some(username) => username,
        None => prompt_with_default("Username", config.last_username.as_deref())?,
    };
    let password = match std::env::var("CHIRPLINE_PASSWORD") {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    if !session.login(username.trim(), &password).await {
        bail!(session
            .last_error()
            .unwrap_or_else(|| "Login failed".to_string()));
    }

    config.last_username = Some(username.trim().to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    if let Some(user) = session.user() {
        println!("Signed in as {} ({}).", user.display_name(), user.handle());
    }
    Ok(())
}

async fn register(session: &SessionController) -> Result<()> {
    let data = RegisterData {
        username: prompt("Username")?,
        email: prompt("Email")?,
        first_name: prompt("First name")?,
        last_name: prompt("Last name")?,
        password: rpassword::prompt_password("Password: ").context("Failed to read password")?,
        bio: Some(prompt("Bio (optional)")?).filter(|b| !b.is_empty()),
    };
    let confirm = rpassword::prompt_password("Confirm password: ")
        .context("Failed to read password")?;
    data.validate(&confirm)?;

    debug!(username = %data.username, "Registering");
    if !session.register(&data).await {
        bail!(session
            .last_error()
            .unwrap_or_else(|| "Registration failed".to_string()));
    }

    match session.user() {
        Some(user) => println!("Welcome, {}! You are signed in.", user.display_name()),
        None => println!("Account created. Run `chirpline login` to sign in."),
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    prompt_with_default(label, None)
}

fn prompt_with_default(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(default) => print!("{} [{}]: ", label, default),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    let value = line.trim().to_string();

    Ok(match default {
        Some(default) if value.is_empty() => default.to_string(),
        _ => value,
    })
}
