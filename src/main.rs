use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tracing::info;
use warp::Filter;

use candor::{
    api,
    auth::Sessions,
    config::Config,
    health::HealthChecker,
    metrics::MetricsRegistry,
    ratelimit::RateLimiter,
    sentiment::SentimentClient,
    store::MessageStore,
    suggest::SuggestClient,
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cfg = Config::from_env();

    info!("Starting candor API server on port {}...", cfg.port);

    let store = Arc::new(MessageStore::new());
    let sessions = Arc::new(Sessions::new());
    let sentiment = Arc::new(SentimentClient::new(
        &cfg.sentiment_url,
        cfg.sentiment_api_key.clone(),
        Duration::from_secs(cfg.sentiment_timeout_secs),
    ));
    let suggest = Arc::new(SuggestClient::new(
        &cfg.suggest_url,
        cfg.suggest_api_key.clone(),
        &cfg.suggest_model,
    ));
    let limiter = Arc::new(RateLimiter::new(
        Duration::from_secs(cfg.rate_limit_window_secs),
        cfg.rate_limit_max_hits,
        cfg.rate_limit_max_keys,
    ));
    let metrics_registry = Arc::new(MetricsRegistry::new());
    let health_checker = Arc::new(HealthChecker::new());

    let api_routes = api::routes(store, sessions, sentiment, suggest, limiter);

    // Metrics endpoint
    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .and(with_metrics(metrics_registry))
        .and_then(handle_metrics);

    // Health check endpoint
    let health_route = warp::path("health")
        .and(warp::get())
        .and(with_health_checker(health_checker))
        .and(with_config(cfg.clone()))
        .and_then(handle_health);

    // Root endpoint
    let root_route = warp::path::end()
        .and(warp::get())
        .map(|| "candor API - /api, /health, /metrics");

    let routes = api_routes
        .or(metrics_route)
        .or(health_route)
        .or(root_route)
        .recover(api::handle_rejection);

    warp::serve(routes).run(([0, 0, 0, 0], cfg.port)).await;
}

fn with_metrics(
    metrics: Arc<MetricsRegistry>,
) -> impl Filter<Extract = (Arc<MetricsRegistry>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || metrics.clone())
}

fn with_health_checker(
    health_checker: Arc<HealthChecker>,
) -> impl Filter<Extract = (Arc<HealthChecker>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || health_checker.clone())
}

fn with_config(
    config: Config,
) -> impl Filter<Extract = (Config,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || config.clone())
}

async fn handle_metrics(metrics: Arc<MetricsRegistry>) -> Result<impl warp::Reply, warp::Rejection> {
    let metrics_text = metrics.gather_metrics();
    Ok(warp::reply::with_header(
        metrics_text,
        "Content-Type",
        "text/plain; version=0.0.4; charset=utf-8",
    ))
}

async fn handle_health(
    health_checker: Arc<HealthChecker>,
    config: Config,
) -> Result<impl warp::Reply, warp::Rejection> {
    let health_status = health_checker
        .get_overall_health(&config.sentiment_url, &config.suggest_url)
        .await;

    let json_response = serde_json::to_string_pretty(&health_status)
        .unwrap_or_else(|_| "{\"error\": \"Failed to serialize health status\"}".to_string());

    Ok(warp::reply::with_header(
        json_response,
        "Content-Type",
        "application/json",
    ))
}
