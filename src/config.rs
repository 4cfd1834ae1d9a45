use std::env;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub sentiment_url: String,
    pub sentiment_api_key: Option<String>,
    pub sentiment_timeout_secs: u64,
    pub suggest_url: String,
    pub suggest_api_key: Option<String>,
    pub suggest_model: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_hits: u32,
    pub rate_limit_max_keys: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parse_or("PORT", 8080),
            sentiment_url: env::var("SENTIMENT_URL")
                .expect("Expected SENTIMENT_URL in env"),
            sentiment_api_key: env::var("SENTIMENT_API_KEY").ok(),
            sentiment_timeout_secs: parse_or("SENTIMENT_TIMEOUT_SECS", 5),
            suggest_url: env::var("SUGGEST_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".into()),
            suggest_api_key: env::var("SUGGEST_API_KEY").ok(),
            suggest_model: env::var("SUGGEST_MODEL")
                .unwrap_or_else(|_| "openai/gpt-oss-20b".into()),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW_SECS", 60),
            rate_limit_max_hits: parse_or("RATE_LIMIT_MAX_HITS", 5),
            rate_limit_max_keys: parse_or("RATE_LIMIT_MAX_KEYS", 10_000),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
