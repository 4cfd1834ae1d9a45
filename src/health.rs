use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub services: std::collections::HashMap<String, ServiceHealth>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceHealth {
    pub status: String,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
}

pub struct HealthChecker {
    sentiment_healthy: Arc<Mutex<bool>>,
    suggest_healthy: Arc<Mutex<bool>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            sentiment_healthy: Arc::new(Mutex::new(false)),
            suggest_healthy: Arc::new(Mutex::new(false)),
        }
    }

    pub async fn check_sentiment(&self, base_url: &str) -> ServiceHealth {
        let start = std::time::Instant::now();

        // The worker only serves POST on its classification route; any
        // non-5xx answer on the base URL means it is up.
        match reqwest::get(base_url).await {
            Ok(response) => {
                let response_time = start.elapsed().as_millis() as u64;
                if !response.status().is_server_error() {
                    *self.sentiment_healthy.lock().await = true;
                    ServiceHealth {
                        status: "healthy".to_string(),
                        message: Some("Sentiment endpoint reachable".to_string()),
                        response_time_ms: Some(response_time),
                    }
                } else {
                    *self.sentiment_healthy.lock().await = false;
                    ServiceHealth {
                        status: "unhealthy".to_string(),
                        message: Some(format!(
                            "Sentiment endpoint returned status: {}",
                            response.status()
                        )),
                        response_time_ms: Some(response_time),
                    }
                }
            }
            Err(e) => {
                *self.sentiment_healthy.lock().await = false;
                ServiceHealth {
                    status: "unhealthy".to_string(),
                    message: Some(format!("Sentiment endpoint connection error: {}", e)),
                    response_time_ms: Some(start.elapsed().as_millis() as u64),
                }
            }
        }
    }

    pub async fn check_suggest(&self, base_url: &str) -> ServiceHealth {
        let start = std::time::Instant::now();

        match reqwest::get(base_url).await {
            Ok(response) => {
                let response_time = start.elapsed().as_millis() as u64;
                if !response.status().is_server_error() {
                    *self.suggest_healthy.lock().await = true;
                    ServiceHealth {
                        status: "healthy".to_string(),
                        message: Some("Suggestion endpoint reachable".to_string()),
                        response_time_ms: Some(response_time),
                    }
                } else {
                    *self.suggest_healthy.lock().await = false;
                    ServiceHealth {
                        status: "unhealthy".to_string(),
                        message: Some(format!(
                            "Suggestion endpoint returned status: {}",
                            response.status()
                        )),
                        response_time_ms: Some(response_time),
                    }
                }
            }
            Err(e) => {
                *self.suggest_healthy.lock().await = false;
                ServiceHealth {
                    status: "unhealthy".to_string(),
                    message: Some(format!("Suggestion endpoint connection error: {}", e)),
                    response_time_ms: Some(start.elapsed().as_millis() as u64),
                }
            }
        }
    }

    pub async fn get_overall_health(&self, sentiment_url: &str, suggest_url: &str) -> HealthStatus {
        let mut services = std::collections::HashMap::new();

        services.insert("sentiment".to_string(), self.check_sentiment(sentiment_url).await);
        services.insert("suggest".to_string(), self.check_suggest(suggest_url).await);

        let all_healthy = services.values().all(|service| service.status == "healthy");
        let overall_status = if all_healthy { "healthy" } else { "degraded" };

        HealthStatus {
            status: overall_status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            services,
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}
