use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

type DynErr = Box<dyn std::error::Error + Send + Sync>;

const SUGGESTION_PROMPT: &str = "Create a list of three open-ended and engaging \
questions formatted as a single string. Each question should be separated by '||'. \
These questions are for an anonymous social messaging platform and should be \
suitable for a diverse audience. Avoid personal or sensitive topics, focusing \
instead on universal themes that encourage friendly interaction. Ensure the \
questions are intriguing, foster curiosity, and contribute to a positive and \
welcoming conversational environment.";

/// Client for the chat-completion endpoint that drafts suggested
/// questions for senders staring at an empty box.
#[derive(Debug, Clone)]
pub struct SuggestClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl SuggestClient {
    pub fn new(base_url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
        }
    }

    pub async fn suggest(&self) -> Result<String, DynErr> {
        let Some(key) = &self.api_key else {
            return Err("Suggestion API key not configured".into());
        };

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": SUGGESTION_PROMPT}]
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(format!("Suggestion error: {}", res.text().await?).into());
        }

        let body: serde_json::Value = res.json().await?;
        if let Some(text) = body["choices"][0]["message"]["content"].as_str() {
            let questions = text.trim().to_string();
            if questions.is_empty() {
                return Err("Empty completion from suggestion endpoint".into());
            }
            info!(len = questions.len(), "Generated suggested questions");
            Ok(questions)
        } else {
            warn!("No content in suggestion response: {body:?}");
            Err("No generated text found".into())
        }
    }
}
