use std::convert::Infallible;
use std::sync::Arc;

use serde::Deserialize;
use tracing::error;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::auth::Sessions;
use crate::mailer;
use crate::metrics::{MESSAGES_RECEIVED, RATE_LIMIT_REJECTIONS, SUGGESTION_REQUESTS};
use crate::ratelimit::RateLimiter;
use crate::retrieval;
use crate::schema::{ApiMessage, Message};
use crate::sentiment::SentimentClient;
use crate::store::{MessageStore, StoreError};
use crate::suggest::SuggestClient;

const MIN_MESSAGE_CHARS: usize = 10;
const MAX_MESSAGE_CHARS: usize = 300;
const GENERIC_FAILURE: &str = "Something went wrong, please try again later";

#[derive(Debug)]
pub struct Unauthorized;
impl warp::reject::Reject for Unauthorized {}

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct SendVerificationRequest {
    pub username: String,
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct AcceptMessagesRequest {
    pub accepting: bool,
}

pub fn routes(
    store: Arc<MessageStore>,
    sessions: Arc<Sessions>,
    sentiment: Arc<SentimentClient>,
    suggest: Arc<SuggestClient>,
    limiter: Arc<RateLimiter>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let sign_up = warp::path!("api" / "sign-up")
        .and(warp::post())
        .and(json_body())
        .and(with_store(store.clone()))
        .and_then(handle_sign_up);

    let send_verification = warp::path!("api" / "send-verification")
        .and(warp::post())
        .and(json_body())
        .and(client_ip())
        .and(with_store(store.clone()))
        .and(with_limiter(limiter.clone()))
        .and_then(handle_send_verification);

    let verify_code = warp::path!("api" / "verify-code" / String)
        .and(warp::post())
        .and(json_body())
        .and(with_store(store.clone()))
        .and(with_sessions(sessions.clone()))
        .and_then(handle_verify_code);

    let get_messages = warp::path!("api" / "messages")
        .and(warp::get())
        .and(with_session(sessions.clone()))
        .and(with_store(store.clone()))
        .and(with_sentiment(sentiment))
        .and_then(handle_get_messages);

    let send_message = warp::path!("api" / "messages" / String)
        .and(warp::post())
        .and(json_body())
        .and(client_ip())
        .and(with_store(store.clone()))
        .and(with_limiter(limiter.clone()))
        .and_then(handle_send_message);

    let accept_status = warp::path!("api" / "accept-messages")
        .and(warp::get())
        .and(with_session(sessions.clone()))
        .and(with_store(store.clone()))
        .and_then(handle_accept_status);

    let accept_toggle = warp::path!("api" / "accept-messages")
        .and(warp::post())
        .and(with_session(sessions))
        .and(json_body())
        .and(with_store(store))
        .and_then(handle_accept_toggle);

    let suggest_messages = warp::path!("api" / "suggest-messages")
        .and(warp::post())
        .and(client_ip())
        .and(with_suggest(suggest))
        .and(with_limiter(limiter))
        .and_then(handle_suggest_messages);

    sign_up
        .or(send_verification)
        .or(verify_code)
        .or(get_messages)
        .or(send_message)
        .or(accept_status)
        .or(accept_toggle)
        .or(suggest_messages)
}

fn with_store(
    store: Arc<MessageStore>,
) -> impl Filter<Extract = (Arc<MessageStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_sessions(
    sessions: Arc<Sessions>,
) -> impl Filter<Extract = (Arc<Sessions>,), Error = Infallible> + Clone {
    warp::any().map(move || sessions.clone())
}

fn with_sentiment(
    sentiment: Arc<SentimentClient>,
) -> impl Filter<Extract = (Arc<SentimentClient>,), Error = Infallible> + Clone {
    warp::any().map(move || sentiment.clone())
}

fn with_suggest(
    suggest: Arc<SuggestClient>,
) -> impl Filter<Extract = (Arc<SuggestClient>,), Error = Infallible> + Clone {
    warp::any().map(move || suggest.clone())
}

fn with_limiter(
    limiter: Arc<RateLimiter>,
) -> impl Filter<Extract = (Arc<RateLimiter>,), Error = Infallible> + Clone {
    warp::any().map(move || limiter.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(16 * 1024).and(warp::body::json())
}

/// Resolves the bearer session token to a username, rejecting with 401
/// when the header is absent, malformed, or unknown.
fn with_session(
    sessions: Arc<Sessions>,
) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_sessions(sessions))
        .and_then(|header: Option<String>, sessions: Arc<Sessions>| async move {
            let token = header.as_deref().and_then(|h| h.strip_prefix("Bearer "));
            match token {
                Some(token) => match sessions.resolve(token).await {
                    Some(username) => Ok(username),
                    None => Err(warp::reject::custom(Unauthorized)),
                },
                None => Err(warp::reject::custom(Unauthorized)),
            }
        })
}

/// First hop of `x-forwarded-for`, or "unknown" when there is none — the
/// key the rate limiter buckets anonymous callers by.
fn client_ip() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-forwarded-for").map(|forwarded: Option<String>| {
        forwarded
            .as_deref()
            .and_then(|v| v.split(',').next())
            .map(|ip| ip.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    })
}

fn reply(
    status: StatusCode,
    success: bool,
    message: &str,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ApiMessage {
            success,
            message: message.to_string(),
        }),
        status,
    )
}

async fn handle_sign_up(
    req: SignUpRequest,
    store: Arc<MessageStore>,
) -> Result<impl Reply, Rejection> {
    let username = req.username.trim();
    let email = req.email.trim();

    if username.len() < 2 || !mailer::is_valid_email(email) {
        return Ok(reply(
            StatusCode::BAD_REQUEST,
            false,
            "Invalid input. Please check your email and username.",
        ));
    }

    match store.register(username, email).await {
        Ok(code) => {
            if let Err(err) = mailer::deliver_verification(username, email, &code) {
                error!(error = %err, "Failed to deliver verification code");
                return Ok(reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    false,
                    "Failed to send verification email",
                ));
            }
            Ok(reply(
                StatusCode::CREATED,
                true,
                "User registered successfully. Please verify your account.",
            ))
        }
        Err(err @ (StoreError::UsernameTaken | StoreError::EmailTaken)) => {
            Ok(reply(StatusCode::BAD_REQUEST, false, &err.to_string()))
        }
        Err(err) => {
            error!(error = %err, "Sign-up failed");
            Ok(reply(StatusCode::INTERNAL_SERVER_ERROR, false, GENERIC_FAILURE))
        }
    }
}

async fn handle_send_verification(
    req: SendVerificationRequest,
    ip: String,
    store: Arc<MessageStore>,
    limiter: Arc<RateLimiter>,
) -> Result<impl Reply, Rejection> {
    if !limiter.allow(&ip).await {
        RATE_LIMIT_REJECTIONS.inc();
        return Ok(reply(
            StatusCode::TOO_MANY_REQUESTS,
            false,
            "Please wait before requesting another verification code.",
        ));
    }

    match store.refresh_code(req.username.trim()).await {
        Ok((email, code)) => {
            if let Err(err) = mailer::deliver_verification(req.username.trim(), &email, &code) {
                error!(error = %err, "Failed to deliver verification code");
                return Ok(reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    false,
                    "Failed to send verification email",
                ));
            }
            Ok(reply(
                StatusCode::OK,
                true,
                "Verification email sent successfully.",
            ))
        }
        Err(StoreError::UserNotFound) => Ok(reply(StatusCode::NOT_FOUND, false, "User not found")),
        Err(err @ StoreError::AlreadyVerified) => {
            Ok(reply(StatusCode::BAD_REQUEST, false, &err.to_string()))
        }
        Err(err) => {
            error!(error = %err, "Verification re-request failed");
            Ok(reply(StatusCode::INTERNAL_SERVER_ERROR, false, GENERIC_FAILURE))
        }
    }
}

async fn handle_verify_code(
    username: String,
    req: VerifyCodeRequest,
    store: Arc<MessageStore>,
    sessions: Arc<Sessions>,
) -> Result<impl Reply, Rejection> {
    let code = req.code.trim();
    if code.is_empty() {
        return Ok(reply(
            StatusCode::BAD_REQUEST,
            false,
            "Missing verification code",
        ));
    }

    match store.verify_code(&username, code).await {
        Ok(()) => {
            let token = sessions.issue(&username).await;
            let body = serde_json::json!({
                "success": true,
                "message": "Account verified successfully",
                "token": token,
            });
            Ok(warp::reply::with_status(
                warp::reply::json(&body),
                StatusCode::OK,
            ))
        }
        Err(StoreError::UserNotFound) => Ok(reply(StatusCode::NOT_FOUND, false, "User not found")),
        Err(err @ (StoreError::CodeExpired | StoreError::CodeMismatch)) => {
            Ok(reply(StatusCode::BAD_REQUEST, false, &err.to_string()))
        }
        Err(err) => {
            error!(error = %err, "Verification failed");
            Ok(reply(StatusCode::INTERNAL_SERVER_ERROR, false, GENERIC_FAILURE))
        }
    }
}

async fn handle_get_messages(
    username: String,
    store: Arc<MessageStore>,
    sentiment: Arc<SentimentClient>,
) -> Result<impl Reply, Rejection> {
    match retrieval::fetch_bucketed_messages(&store, &sentiment, &username).await {
        Ok(response) => Ok(warp::reply::with_status(
            warp::reply::json(&response),
            StatusCode::OK,
        )),
        Err(err) => {
            error!(error = %err, username = %username, "Message retrieval failed");
            Ok(reply(StatusCode::INTERNAL_SERVER_ERROR, false, GENERIC_FAILURE))
        }
    }
}

async fn handle_send_message(
    username: String,
    req: SendMessageRequest,
    ip: String,
    store: Arc<MessageStore>,
    limiter: Arc<RateLimiter>,
) -> Result<impl Reply, Rejection> {
    if !limiter.allow(&ip).await {
        RATE_LIMIT_REJECTIONS.inc();
        return Ok(reply(
            StatusCode::TOO_MANY_REQUESTS,
            false,
            "Too many requests. Please wait a moment and try again.",
        ));
    }

    let content = req.content.trim();
    if content.chars().count() < MIN_MESSAGE_CHARS || content.chars().count() > MAX_MESSAGE_CHARS {
        return Ok(reply(
            StatusCode::BAD_REQUEST,
            false,
            "Message content must be between 10 and 300 characters",
        ));
    }

    match store.add_message(&username, Message::new(content)).await {
        Ok(()) => {
            MESSAGES_RECEIVED.inc();
            Ok(reply(StatusCode::OK, true, "Message sent successfully"))
        }
        Err(StoreError::UserNotFound) => Ok(reply(StatusCode::NOT_FOUND, false, "User not found")),
        Err(err @ StoreError::NotAcceptingMessages) => {
            Ok(reply(StatusCode::FORBIDDEN, false, &err.to_string()))
        }
        Err(err) => {
            error!(error = %err, "Failed to store message");
            Ok(reply(StatusCode::INTERNAL_SERVER_ERROR, false, GENERIC_FAILURE))
        }
    }
}

async fn handle_accept_status(
    username: String,
    store: Arc<MessageStore>,
) -> Result<impl Reply, Rejection> {
    match store.is_accepting(&username).await {
        Ok(accepting) => {
            let body = serde_json::json!({
                "success": true,
                "is_accepting_messages": accepting,
            });
            Ok(warp::reply::with_status(
                warp::reply::json(&body),
                StatusCode::OK,
            ))
        }
        Err(err) => {
            error!(error = %err, username = %username, "Failed to read acceptance flag");
            Ok(reply(StatusCode::INTERNAL_SERVER_ERROR, false, GENERIC_FAILURE))
        }
    }
}

async fn handle_accept_toggle(
    username: String,
    req: AcceptMessagesRequest,
    store: Arc<MessageStore>,
) -> Result<impl Reply, Rejection> {
    match store.set_accepting(&username, req.accepting).await {
        Ok(()) => {
            let body = serde_json::json!({
                "success": true,
                "message": "Message acceptance updated",
                "is_accepting_messages": req.accepting,
            });
            Ok(warp::reply::with_status(
                warp::reply::json(&body),
                StatusCode::OK,
            ))
        }
        Err(err) => {
            error!(error = %err, username = %username, "Failed to update acceptance flag");
            Ok(reply(StatusCode::INTERNAL_SERVER_ERROR, false, GENERIC_FAILURE))
        }
    }
}

async fn handle_suggest_messages(
    ip: String,
    suggest: Arc<SuggestClient>,
    limiter: Arc<RateLimiter>,
) -> Result<impl Reply, Rejection> {
    if !limiter.allow(&ip).await {
        RATE_LIMIT_REJECTIONS.inc();
        return Ok(reply(
            StatusCode::TOO_MANY_REQUESTS,
            false,
            "Too many requests. Please wait a moment and try again.",
        ));
    }

    SUGGESTION_REQUESTS.inc();
    match suggest.suggest().await {
        Ok(questions) => {
            let body = serde_json::json!({
                "success": true,
                "questions": questions,
            });
            Ok(warp::reply::with_status(
                warp::reply::json(&body),
                StatusCode::OK,
            ))
        }
        Err(err) => {
            error!(error = %err, "Suggestion generation failed");
            Ok(reply(
                StatusCode::BAD_GATEWAY,
                false,
                "Failed to generate questions. Please try again later.",
            ))
        }
    }
}

/// Turns every rejection into the `{ success, message }` envelope so
/// callers never see warp's default bodies.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<Unauthorized>().is_some() {
        (StatusCode::UNAUTHORIZED, "Unauthorized")
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (StatusCode::BAD_REQUEST, "Malformed request body")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        error!(?err, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE)
    };

    Ok(reply(status, false, message))
}
