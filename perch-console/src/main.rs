use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use perch_api::SocialApi;
use perch_api::auth::SignupRequest;
use perch_api::media;
use perch_api::types::NewPost;
use perch_common::observability::{LogConfig, init_logging};
use perch_common::mask_secret;
use perch_config::{PerchConfig, PerchConfigLoader};
use perch_feed::{Cursor, FeedKind, MergePolicy};
use perch_http::HttpClient;

mod feed;
mod render;

use render::print_optional;

/// Developer console for the social backend API: one subcommand per
/// operation the old per-page web console exposed.
#[derive(Parser)]
#[command(name = "perch", version, about)]
struct Cli {
    /// Config file (missing file falls back to env/defaults)
    #[arg(long, default_value = "perch.yaml")]
    config: PathBuf,
    /// Bearer token override
    #[arg(long, env = "PERCH_ACCESS_TOKEN")]
    access_token: Option<String>,
    /// CSRF token override
    #[arg(long, env = "PERCH_CSRF_TOKEN")]
    csrf_token: Option<String>,
    /// Echo the log to stderr as well as the log file
    #[arg(long, short)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        display_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "en")]
        locale: String,
        #[arg(long, default_value = "UTC")]
        timezone: String,
    },
    /// Magic-link sign-in
    MagicLink {
        #[command(subcommand)]
        action: MagicLinkAction,
    },
    /// Verify a signup token
    Verify { token: String },
    /// Trade the refresh-token cookie for a new access token
    Refresh,
    /// Prime the anti-forgery cookie and print the token
    Csrf,
    /// Follow a user
    Follow { user_id: u64 },
    /// Unfollow a user
    Unfollow { user_id: u64 },
    /// List a user's followers
    Followers { user_id: u64 },
    /// List who a user follows
    Following { user_id: u64 },
    /// Like a tweet
    Like { tweet_id: u64 },
    /// Remove a like
    Unlike { tweet_id: u64 },
    /// Repost a tweet
    Repost { tweet_id: u64 },
    /// Undo a repost
    Unrepost { tweet_id: u64 },
    /// Create a post, optionally with media attachments
    Post {
        #[arg(long)]
        content: String,
        /// Media file; repeatable
        #[arg(long = "media")]
        media: Vec<PathBuf>,
    },
    /// Reply to a tweet, optionally with media attachments
    Reply {
        tweet_id: u64,
        #[arg(long)]
        content: String,
        /// Media file; repeatable
        #[arg(long = "media")]
        media: Vec<PathBuf>,
    },
    /// Prefix-search users
    Search {
        prefix: String,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Load feed pages
    Timeline {
        #[command(subcommand)]
        feed: FeedCommand,
    },
    /// Download a stored media object
    Media {
        storage_key: String,
        /// Output file (defaults to the storage key)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MagicLinkAction {
    /// Ask the backend to mail a magic link
    Request {
        #[arg(long)]
        email: String,
    },
    /// Exchange the token from the link for an access token
    Consume { token: String },
}

#[derive(Subcommand)]
enum FeedCommand {
    /// Home timeline
    Home {
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        /// Pages to load in sequence
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Replace instead of append when navigating by cursor
        #[arg(long)]
        replace: bool,
    },
    /// Replies to a tweet
    Replies {
        tweet_id: u64,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long)]
        replace: bool,
    },
    /// A user's tweets
    User {
        user_id: u64,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long)]
        replace: bool,
    },
    /// Score-ranked popular tweets (always accumulates)
    Popular {
        #[arg(long)]
        cursor_like: Option<String>,
        #[arg(long)]
        cursor_id: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        day_count: Option<u32>,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg: PerchConfig = PerchConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .context("loading console configuration")?;

    init_logging(LogConfig {
        emit_stderr: cli.verbose,
        ..LogConfig::default()
    })?;

    let http = if cfg.http.insecure {
        HttpClient::insecure(&cfg.base_url)?
    } else {
        HttpClient::new(&cfg.base_url)?
    }
    .with_timeout(std::time::Duration::from_secs(cfg.http.timeout_secs))
    .with_retries(cfg.http.retries);

    let mut creds = cfg.credentials.clone();
    if let Some(token) = cli.access_token {
        creds.access_token = Some(token);
    }
    if let Some(token) = cli.csrf_token {
        creds.csrf_token = Some(token);
    }
    tracing::debug!(
        access_token = %creds.access_token.as_deref().map(mask_secret).unwrap_or_else(|| "<unset>".into()),
        csrf_token = %creds.csrf_token.as_deref().map(mask_secret).unwrap_or_else(|| "<unset>".into()),
        base_url = %cfg.base_url,
        "console.start"
    );

    let mut api = SocialApi::new(http, creds);
    let output = cfg.output;

    match cli.command {
        Command::Signup {
            username,
            display_name,
            email,
            password,
            locale,
            timezone,
        } => {
            let req = SignupRequest {
                username,
                display_name,
                email,
                password,
                locale,
                timezone,
            };
            print_optional(&api.signup(&req).await?, output);
        }
        Command::MagicLink { action } => match action {
            MagicLinkAction::Request { email } => {
                print_optional(&api.request_magic_link(&email).await?, output);
            }
            MagicLinkAction::Consume { token } => {
                let issued = api.consume_magic_link(&token).await?;
                render::print_json(&serde_json::to_value(&issued)?, output);
            }
        },
        Command::Verify { token } => {
            print_optional(&api.verify(&token).await?, output);
        }
        Command::Refresh => {
            let issued = api.refresh().await?;
            render::print_json(&serde_json::to_value(&issued)?, output);
        }
        Command::Csrf => match api.fetch_csrf().await? {
            Some(token) => println!("{token}"),
            None => println!("(cookie primed, no token echoed)"),
        },
        Command::Follow { user_id } => print_optional(&api.follow(user_id).await?, output),
        Command::Unfollow { user_id } => print_optional(&api.unfollow(user_id).await?, output),
        Command::Followers { user_id } => {
            render::print_json(&api.followers(user_id).await?, output)
        }
        Command::Following { user_id } => {
            render::print_json(&api.following(user_id).await?, output)
        }
        Command::Like { tweet_id } => print_optional(&api.like(tweet_id).await?, output),
        Command::Unlike { tweet_id } => print_optional(&api.unlike(tweet_id).await?, output),
        Command::Repost { tweet_id } => print_optional(&api.repost(tweet_id).await?, output),
        Command::Unrepost { tweet_id } => print_optional(&api.unrepost(tweet_id).await?, output),
        Command::Post { content, media: files } => {
            let mut medias = Vec::new();
            for path in &files {
                if let Some(upload) = media::upload_from_file(path)
                    .with_context(|| format!("preparing {}", path.display()))?
                {
                    medias.push(upload);
                }
            }
            if !files.is_empty() && medias.is_empty() {
                anyhow::bail!("none of the given files are uploadable media");
            }
            let post = NewPost {
                content,
                in_reply_to_tweet: None,
                medias,
            };
            print_optional(&api.post(&post).await?, output);
        }
        Command::Reply {
            tweet_id,
            content,
            media: files,
        } => {
            let mut loaded = Vec::new();
            for path in &files {
                if let Some(file) = media::load_media_file(path)
                    .with_context(|| format!("reading {}", path.display()))?
                {
                    loaded.push(file);
                }
            }
            print_optional(&api.reply(tweet_id, &content, &loaded).await?, output);
        }
        Command::Search {
            prefix,
            cursor,
            limit,
        } => {
            let limit = limit.unwrap_or(cfg.feed.limit);
            let out = api.search_users(&prefix, cursor.as_deref(), limit).await?;
            render::print_json(&out, output);
        }
        Command::Timeline { feed: cmd } => {
            let defaults = &cfg.feed;
            let (kind, start, limit, day_count, pages, policy) = match cmd {
                FeedCommand::Home {
                    cursor,
                    limit,
                    pages,
                    replace,
                } => (
                    FeedKind::Home,
                    Cursor::Scalar(cursor),
                    limit.unwrap_or(defaults.limit),
                    None,
                    pages,
                    merge_policy(replace),
                ),
                FeedCommand::Replies {
                    tweet_id,
                    cursor,
                    limit,
                    pages,
                    replace,
                } => (
                    FeedKind::Replies { tweet_id },
                    Cursor::Scalar(cursor),
                    limit.unwrap_or(defaults.limit),
                    None,
                    pages,
                    merge_policy(replace),
                ),
                FeedCommand::User {
                    user_id,
                    cursor,
                    limit,
                    pages,
                    replace,
                } => (
                    FeedKind::UserTweets { user_id },
                    Cursor::Scalar(cursor),
                    limit.unwrap_or(defaults.limit),
                    None,
                    pages,
                    merge_policy(replace),
                ),
                FeedCommand::Popular {
                    cursor_like,
                    cursor_id,
                    limit,
                    day_count,
                    pages,
                } => (
                    FeedKind::Popular,
                    Cursor::Compound {
                        like: cursor_like,
                        id: cursor_id,
                    },
                    limit.unwrap_or(defaults.limit),
                    Some(day_count.unwrap_or(defaults.day_count)),
                    pages,
                    // The popular view always accumulates across pages.
                    MergePolicy::Append,
                ),
            };
            feed::run(&api, kind, start, limit, day_count, pages, policy, output).await?;
        }
        Command::Media { storage_key, out } => {
            let bytes = api.media(&storage_key).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(&storage_key));
            std::fs::write(&path, &bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{} bytes -> {}", bytes.len(), path.display());
        }
    }

    Ok(())
}

fn merge_policy(replace: bool) -> MergePolicy {
    if replace {
        MergePolicy::Replace
    } else {
        MergePolicy::Append
    }
}
