//! Timeout selection for webhook calls.

use std::time::Duration;

use iverton_types::config::TimeoutPolicy;

const AI_KEYWORDS: &[&str] = &["openai", "gpt", "ai", "ml"];
const EMAIL_KEYWORDS: &[&str] = &["email", "sendgrid", "mail"];
const CALLBACK_KEYWORDS: &[&str] = &["webhook", "callback", "dashboard"];
const SOCIAL_KEYWORDS: &[&str] = &["twitter", "facebook", "linkedin", "instagram"];
const SLACK_KEYWORDS: &[&str] = &["slack"];
const COMMERCE_KEYWORDS: &[&str] = &["shopify", "amazon", "ebay"];

/// Timeout for a call to `endpoint` under `policy`.
///
/// `Fixed` always yields `default_ms`. `ByOperation` inspects the words of
/// the endpoint path; the first matching group wins, in order: AI (30 s),
/// email (15 s), webhook/callback/dashboard (15 s), social (20 s), Slack
/// (10 s), e-commerce (25 s). Anything else gets `default_ms`.
pub fn resolve_timeout(policy: TimeoutPolicy, endpoint: &str, default_ms: u64) -> Duration {
    let ms = match policy {
        TimeoutPolicy::Fixed => default_ms,
        TimeoutPolicy::ByOperation => by_operation(endpoint).unwrap_or(default_ms),
    };
    Duration::from_millis(ms)
}

fn by_operation(endpoint: &str) -> Option<u64> {
    let lower = endpoint.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let table: [(&[&str], u64); 6] = [
        (AI_KEYWORDS, 30_000),
        (EMAIL_KEYWORDS, 15_000),
        (CALLBACK_KEYWORDS, 15_000),
        (SOCIAL_KEYWORDS, 20_000),
        (SLACK_KEYWORDS, 10_000),
        (COMMERCE_KEYWORDS, 25_000),
    ];

    table
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| matches_keyword(&words, k)))
        .map(|(_, ms)| *ms)
}

// Short keywords must be a whole word so "ai" does not match "email".
fn matches_keyword(words: &[&str], keyword: &str) -> bool {
    words.iter().any(|word| {
        if keyword.len() < 4 {
            *word == keyword
        } else {
            word.contains(keyword)
        }
    })
}
