//! Response rendering for the terminal.

use perch_api::types::Tweet;
use perch_common::OutputFormat;
use serde_json::Value;

pub fn print_json(value: &Value, format: OutputFormat) {
    let rendered = match format {
        OutputFormat::Json => value.to_string(),
        OutputFormat::Pretty => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
    };
    println!("{rendered}");
}

/// Endpoints that may answer with no body print a placeholder, the way the
/// old console logged "(no body)".
pub fn print_optional(value: &Option<Value>, format: OutputFormat) {
    match value {
        Some(v) => print_json(v, format),
        None => println!("(no body)"),
    }
}

/// One compact line per feed item, falling back to raw JSON for items that
/// don't look like tweets.
pub fn print_feed_item(item: &Value, format: OutputFormat) {
    if matches!(format, OutputFormat::Json) {
        println!("{item}");
        return;
    }
    let tweet = Tweet::from_value(item);
    match (&tweet.username, &tweet.content) {
        (Some(username), Some(content)) => {
            let media = if tweet.media.is_empty() {
                String::new()
            } else {
                format!(" [{} media]", tweet.media.len())
            };
            println!(
                "@{username}: {content}{media} (likes {} / replies {} / reposts {})",
                tweet.like_count.unwrap_or(0),
                tweet.reply_count.unwrap_or(0),
                tweet.repost_count.unwrap_or(0),
            );
        }
        _ => println!("{item}"),
    }
}
