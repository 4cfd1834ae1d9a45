//! Anonymous feedback backend. Per-user shareable links collect messages;
//! owners retrieve their inbox bucketed by sentiment, classified through a
//! remote worker with batch-first calls and per-text fallback.

pub mod api;
pub mod auth;
pub mod buckets;
pub mod config;
pub mod health;
pub mod mailer;
pub mod metrics;
pub mod ratelimit;
pub mod retrieval;
pub mod schema;
pub mod sentiment;
pub mod store;
pub mod suggest;
