use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use serde_json::{json, Value};
use warp::Filter;

use candor::api;
use candor::auth::Sessions;
use candor::ratelimit::RateLimiter;
use candor::sentiment::SentimentClient;
use candor::store::MessageStore;
use candor::suggest::SuggestClient;

const DEAD_ENDPOINT: &str = "http://127.0.0.1:1";

fn deps(
    sentiment_url: &str,
    suggest_url: &str,
    max_hits: u32,
) -> (
    Arc<MessageStore>,
    Arc<Sessions>,
    Arc<SentimentClient>,
    Arc<SuggestClient>,
    Arc<RateLimiter>,
) {
    (
        Arc::new(MessageStore::new()),
        Arc::new(Sessions::new()),
        Arc::new(SentimentClient::new(
            sentiment_url,
            None,
            Duration::from_secs(2),
        )),
        Arc::new(SuggestClient::new(
            suggest_url,
            Some("sk-test".to_string()),
            "test-model",
        )),
        Arc::new(RateLimiter::new(Duration::from_secs(60), max_hits, 1000)),
    )
}

fn body_json<T: AsRef<[u8]>>(response: &warp::http::Response<T>) -> Value {
    serde_json::from_slice(response.body().as_ref()).expect("response body should be JSON")
}

#[tokio::test]
async fn retrieval_requires_a_session() {
    let (store, sessions, sentiment, suggest, limiter) =
        deps(DEAD_ENDPOINT, DEAD_ENDPOINT, 100);
    let routes = api::routes(store, sessions, sentiment, suggest, limiter)
        .recover(api::handle_rejection);

    let missing = warp::test::request()
        .method("GET")
        .path("/api/messages")
        .reply(&routes)
        .await;
    assert_eq!(missing.status(), 401);
    assert_eq!(body_json(&missing)["success"], json!(false));

    let bogus = warp::test::request()
        .method("GET")
        .path("/api/messages")
        .header("authorization", "Bearer not-a-real-token")
        .reply(&routes)
        .await;
    assert_eq!(bogus.status(), 401);
}

#[tokio::test]
async fn sign_up_verify_send_and_retrieve() {
    let mut server = mockito::Server::new_async().await;
    let _batch = server
        .mock("POST", "/feedback/sentiment")
        .match_body(Matcher::PartialJson(json!({
            "texts": ["You are doing great work"]
        })))
        .with_status(200)
        .with_body(json!({"results": [{"tag": "POSITIVE", "confidence": 0.95}]}).to_string())
        .create_async()
        .await;

    let (store, sessions, sentiment, suggest, limiter) =
        deps(&server.url(), DEAD_ENDPOINT, 100);
    let routes = api::routes(store.clone(), sessions, sentiment, suggest, limiter)
        .recover(api::handle_rejection);

    let signup = warp::test::request()
        .method("POST")
        .path("/api/sign-up")
        .json(&json!({"username": "alice", "email": "alice@example.com"}))
        .reply(&routes)
        .await;
    assert_eq!(signup.status(), 201);

    // The mail transport is the log; fetch a fresh code straight from the
    // store the way an operator would.
    let (_, code) = store.refresh_code("alice").await.unwrap();

    let verify = warp::test::request()
        .method("POST")
        .path("/api/verify-code/alice")
        .json(&json!({"code": code}))
        .reply(&routes)
        .await;
    assert_eq!(verify.status(), 200);
    let token = body_json(&verify)["token"].as_str().unwrap().to_string();

    let send = warp::test::request()
        .method("POST")
        .path("/api/messages/alice")
        .json(&json!({"content": "You are doing great work"}))
        .reply(&routes)
        .await;
    assert_eq!(send.status(), 200);

    let inbox = warp::test::request()
        .method("GET")
        .path("/api/messages")
        .header("authorization", format!("Bearer {token}"))
        .reply(&routes)
        .await;
    assert_eq!(inbox.status(), 200);

    let body = body_json(&inbox);
    assert_eq!(body["success"], json!(true));
    assert_eq!(
        body["counts"],
        json!({"positive": 1, "negative": 0, "neutral": 0})
    );
    assert_eq!(body["messages"][0]["sentiment"]["tag"], json!("POSITIVE"));
}

#[tokio::test]
async fn anonymous_send_is_validated() {
    let (store, sessions, sentiment, suggest, limiter) =
        deps(DEAD_ENDPOINT, DEAD_ENDPOINT, 100);
    store.register("bob", "bob@example.com").await.unwrap();
    let routes = api::routes(store.clone(), sessions, sentiment, suggest, limiter)
        .recover(api::handle_rejection);

    let too_short = warp::test::request()
        .method("POST")
        .path("/api/messages/bob")
        .json(&json!({"content": "hi"}))
        .reply(&routes)
        .await;
    assert_eq!(too_short.status(), 400);

    let unknown_user = warp::test::request()
        .method("POST")
        .path("/api/messages/nobody")
        .json(&json!({"content": "long enough content here"}))
        .reply(&routes)
        .await;
    assert_eq!(unknown_user.status(), 404);

    store.set_accepting("bob", false).await.unwrap();
    let not_accepting = warp::test::request()
        .method("POST")
        .path("/api/messages/bob")
        .json(&json!({"content": "long enough content here"}))
        .reply(&routes)
        .await;
    assert_eq!(not_accepting.status(), 403);
    assert_eq!(
        body_json(&not_accepting)["message"],
        json!("User is not accepting messages")
    );
}

#[tokio::test]
async fn accept_messages_toggle_round_trips() {
    let (store, sessions, sentiment, suggest, limiter) =
        deps(DEAD_ENDPOINT, DEAD_ENDPOINT, 100);
    store.register("carol", "carol@example.com").await.unwrap();
    let token = sessions.issue("carol").await;
    let routes = api::routes(store, sessions, sentiment, suggest, limiter)
        .recover(api::handle_rejection);

    let toggle = warp::test::request()
        .method("POST")
        .path("/api/accept-messages")
        .header("authorization", format!("Bearer {token}"))
        .json(&json!({"accepting": false}))
        .reply(&routes)
        .await;
    assert_eq!(toggle.status(), 200);

    let status = warp::test::request()
        .method("GET")
        .path("/api/accept-messages")
        .header("authorization", format!("Bearer {token}"))
        .reply(&routes)
        .await;
    assert_eq!(status.status(), 200);
    assert_eq!(body_json(&status)["is_accepting_messages"], json!(false));
}

#[tokio::test]
async fn verification_rerequest_is_rate_limited() {
    let (store, sessions, sentiment, suggest, limiter) =
        deps(DEAD_ENDPOINT, DEAD_ENDPOINT, 2);
    store.register("dave", "dave@example.com").await.unwrap();
    let routes = api::routes(store, sessions, sentiment, suggest, limiter)
        .recover(api::handle_rejection);

    for _ in 0..2 {
        let ok = warp::test::request()
            .method("POST")
            .path("/api/send-verification")
            .json(&json!({"username": "dave"}))
            .reply(&routes)
            .await;
        assert_eq!(ok.status(), 200);
    }

    let limited = warp::test::request()
        .method("POST")
        .path("/api/send-verification")
        .json(&json!({"username": "dave"}))
        .reply(&routes)
        .await;
    assert_eq!(limited.status(), 429);
    assert_eq!(body_json(&limited)["success"], json!(false));
}

#[tokio::test]
async fn suggestions_proxy_the_completion_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let _completion = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(
            json!({
                "choices": [{"message": {"content": "Q1?||Q2?||Q3?"}}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (store, sessions, sentiment, suggest, limiter) =
        deps(DEAD_ENDPOINT, &server.url(), 100);
    let routes = api::routes(store, sessions, sentiment, suggest, limiter)
        .recover(api::handle_rejection);

    let response = warp::test::request()
        .method("POST")
        .path("/api/suggest-messages")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(body_json(&response)["questions"], json!("Q1?||Q2?||Q3?"));

    // An unreachable completion endpoint degrades to a failure envelope.
    let (store, sessions, sentiment, suggest, limiter) =
        deps(DEAD_ENDPOINT, DEAD_ENDPOINT, 100);
    let routes = api::routes(store, sessions, sentiment, suggest, limiter)
        .recover(api::handle_rejection);
    let failed = warp::test::request()
        .method("POST")
        .path("/api/suggest-messages")
        .reply(&routes)
        .await;
    assert_eq!(failed.status(), 502);
    assert_eq!(body_json(&failed)["success"], json!(false));
}

#[tokio::test]
async fn malformed_bodies_get_the_envelope() {
    let (store, sessions, sentiment, suggest, limiter) =
        deps(DEAD_ENDPOINT, DEAD_ENDPOINT, 100);
    let routes = api::routes(store, sessions, sentiment, suggest, limiter)
        .recover(api::handle_rejection);

    let response = warp::test::request()
        .method("POST")
        .path("/api/sign-up")
        .header("content-type", "application/json")
        .body("{not json")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), 400);
    assert_eq!(body_json(&response)["success"], json!(false));
}
