use tracing::info;

use crate::buckets;
use crate::metrics::{RETRIEVAL_DURATION, RETRIEVAL_REQUESTS};
use crate::schema::RetrievalResponse;
use crate::sentiment::SentimentClient;
use crate::store::{MessageStore, StoreError};

/// End-to-end retrieval: load the caller's messages, classify whatever
/// carries text, and fold everything into sentiment buckets.
///
/// Classification trouble never surfaces here — unclassified messages
/// simply land in neutral with no sentiment attached. Only a store
/// failure is an error, and the caller turns that into a generic server
/// failure.
pub async fn fetch_bucketed_messages(
    store: &MessageStore,
    sentiment: &SentimentClient,
    username: &str,
) -> Result<RetrievalResponse, StoreError> {
    RETRIEVAL_REQUESTS.inc();
    let _timer = RETRIEVAL_DURATION.start_timer();

    let messages = store.load_messages(username).await?;

    if messages.is_empty() {
        return Ok(RetrievalResponse::empty("No messages found"));
    }

    // One extraction pass, index-aligned with `messages`. The batch below
    // is derived from this structure, so the texts sent out and the slots
    // reconciled back can never disagree.
    let extracted: Vec<Option<String>> = messages
        .iter()
        .map(|m| m.classifiable_text().map(str::to_string))
        .collect();
    let texts: Vec<String> = extracted.iter().flatten().cloned().collect();

    let results = if texts.is_empty() {
        info!(
            count = messages.len(),
            "No classifiable text in any message, skipping sentiment call"
        );
        Vec::new()
    } else {
        sentiment.classify(&texts).await
    };

    let (buckets, counts) = buckets::reconcile(messages, &extracted, results);

    Ok(RetrievalResponse::bucketed(buckets, counts))
}
