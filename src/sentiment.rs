use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::metrics::{
    SENTIMENT_BATCH_DURATION, SENTIMENT_FALLBACKS, SENTIMENT_SINGLE_DURATION,
};
use crate::schema::SentimentResult;

/// Client for the remote sentiment worker. One batched call is attempted
/// first; if that call is unusable for any reason, every text is classified
/// individually and concurrently. Failures never escape this module — a
/// text that cannot be classified simply yields `None`.
#[derive(Debug, Clone)]
pub struct SentimentClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    texts: &'a [String],
}

#[derive(Serialize)]
struct SingleRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SentimentResponse {
    results: Vec<SentimentResult>,
}

impl SentimentClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: format!("{}/feedback/sentiment", base_url.trim_end_matches('/')),
            api_key,
        }
    }

    /// Classifies `texts`, returning a vector of exactly the same length
    /// where `output[i]` belongs to `texts[i]`. Callers pre-filter blank
    /// texts; an empty input short-circuits without any request.
    pub async fn classify(&self, texts: &[String]) -> Vec<Option<SentimentResult>> {
        if texts.is_empty() {
            return Vec::new();
        }

        if let Some(results) = self.classify_batch(texts).await {
            return results.into_iter().map(Some).collect();
        }

        SENTIMENT_FALLBACKS.inc();
        info!(
            count = texts.len(),
            "Batch classification unusable, falling back to per-text calls"
        );

        join_all(texts.iter().map(|text| self.classify_one(text))).await
    }

    /// One request carrying all texts. Returns `None` on transport error,
    /// non-success status, undecodable body, or a result list whose length
    /// does not match the input — the caller falls back in every case.
    async fn classify_batch(&self, texts: &[String]) -> Option<Vec<SentimentResult>> {
        let _timer = SENTIMENT_BATCH_DURATION.start_timer();

        let response = match self.request(&BatchRequest { texts }).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Sentiment batch request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Sentiment batch returned non-success status");
            return None;
        }

        let body: SentimentResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "Malformed sentiment batch response");
                return None;
            }
        };

        if body.results.len() != texts.len() {
            warn!(
                expected = texts.len(),
                got = body.results.len(),
                "Sentiment batch length mismatch, discarding"
            );
            return None;
        }

        Some(body.results)
    }

    /// One request for one text. Never errors; anything short of a
    /// well-formed result degrades to `None` for this text only.
    async fn classify_one(&self, text: &str) -> Option<SentimentResult> {
        let _timer = SENTIMENT_SINGLE_DURATION.start_timer();

        let response = match self.request(&SingleRequest { text }).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Sentiment request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Sentiment endpoint returned non-success status");
            return None;
        }

        match response.json::<SentimentResponse>().await {
            Ok(body) => body.results.into_iter().next(),
            Err(err) => {
                warn!(error = %err, "Malformed sentiment response");
                None
            }
        }
    }

    fn request<T: Serialize>(&self, body: &T) -> reqwest::RequestBuilder {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }
}
