//! Reconciliation of classifier output with the source messages.
//!
//! The orchestrator extracts classifiable text exactly once, index-aligned
//! with the message list, and sends only the non-empty texts to the
//! classifier. This module maps the classifier's (batch- or
//! fallback-produced) results back onto the full message list by position
//! and partitions everything into sentiment buckets.

use crate::schema::{Buckets, Counts, EnrichedMessage, Message, SentimentResult};

/// Folds messages and their aligned classification results into buckets.
///
/// `extracted[i]` is the once-computed classifiable text of `messages[i]`;
/// a message with `Some` text consumes the next entry of `results`, a
/// message without one maps to `None` and consumes nothing. Every message
/// lands in exactly one bucket: POSITIVE and NEGATIVE tags in theirs,
/// everything else (UNCERTAIN, unknown tags, missing results) in neutral.
/// Relative order within each bucket follows the input order.
pub fn reconcile(
    messages: Vec<Message>,
    extracted: &[Option<String>],
    results: Vec<Option<SentimentResult>>,
) -> (Buckets, Counts) {
    debug_assert_eq!(messages.len(), extracted.len());

    let mut results = results.into_iter();
    let mut buckets = Buckets::default();

    for (message, text) in messages.into_iter().zip(extracted) {
        let sentiment = match text {
            Some(_) => results.next().flatten(),
            None => None,
        };

        let tag = sentiment
            .as_ref()
            .map(|s| s.tag.to_uppercase())
            .unwrap_or_else(|| "UNCERTAIN".to_string());

        let enriched = EnrichedMessage { message, sentiment };
        match tag.as_str() {
            "POSITIVE" => buckets.positive.push(enriched),
            "NEGATIVE" => buckets.negative.push(enriched),
            _ => buckets.neutral.push(enriched),
        }
    }

    let counts = buckets.counts();
    (buckets, counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn message(id: &str, body: Option<&str>) -> Message {
        Message {
            id: id.to_string(),
            // Spread creation times so ids encode the descending order.
            created_at: Utc::now() - Duration::minutes(id.len() as i64),
            text: None,
            message: None,
            content: body.map(str::to_string),
        }
    }

    fn result(tag: &str) -> Option<SentimentResult> {
        Some(SentimentResult {
            tag: tag.to_string(),
            confidence: 0.9,
            positive_score: 0.5,
            negative_score: 0.5,
        })
    }

    fn extraction(messages: &[Message]) -> Vec<Option<String>> {
        messages
            .iter()
            .map(|m| m.classifiable_text().map(str::to_string))
            .collect()
    }

    #[test]
    fn partitions_every_message_exactly_once() {
        let messages = vec![
            message("a", Some("nice")),
            message("bb", Some("bad")),
            message("ccc", Some("meh")),
        ];
        let extracted = extraction(&messages);
        let results = vec![result("POSITIVE"), result("NEGATIVE"), result("UNCERTAIN")];

        let (buckets, counts) = reconcile(messages, &extracted, results);

        assert_eq!(counts.positive + counts.negative + counts.neutral, 3);
        assert_eq!(counts, buckets.counts());
        assert_eq!(buckets.positive[0].message.id, "a");
        assert_eq!(buckets.negative[0].message.id, "bb");
        assert_eq!(buckets.neutral[0].message.id, "ccc");
    }

    #[test]
    fn unknown_and_missing_results_default_to_neutral() {
        let messages = vec![
            message("a", Some("x")),
            message("bb", Some("y")),
            message("ccc", Some("z")),
        ];
        let extracted = extraction(&messages);
        let results = vec![result("SARCASTIC"), None, result("positive")];

        let (buckets, counts) = reconcile(messages, &extracted, results);

        // Unknown tag and missing result go neutral; lowercase tags are
        // normalized before comparison.
        assert_eq!(counts.neutral, 2);
        assert_eq!(counts.positive, 1);
        assert!(buckets.neutral[1].sentiment.is_none());
        assert_eq!(buckets.positive[0].message.id, "ccc");
    }

    #[test]
    fn blank_messages_consume_no_result() {
        let messages = vec![
            message("a", Some("Great job!")),
            message("bb", Some("   ")),
            message("ccc", Some("This was terrible.")),
        ];
        let extracted = extraction(&messages);
        // Only two classifiable texts, so only two results exist.
        let results = vec![result("POSITIVE"), result("NEGATIVE")];

        let (buckets, counts) = reconcile(messages, &extracted, results);

        assert_eq!(
            counts,
            Counts {
                positive: 1,
                negative: 1,
                neutral: 1
            }
        );
        assert_eq!(buckets.negative[0].message.id, "ccc");
        assert_eq!(buckets.neutral[0].message.id, "bb");
        assert!(buckets.neutral[0].sentiment.is_none());
    }

    #[test]
    fn buckets_preserve_relative_message_order() {
        let messages = vec![
            message("a", Some("1")),
            message("bb", Some("2")),
            message("ccc", Some("3")),
            message("dddd", Some("4")),
        ];
        let extracted = extraction(&messages);
        let results = vec![
            result("POSITIVE"),
            result("NEGATIVE"),
            result("POSITIVE"),
            result("NEGATIVE"),
        ];

        let (buckets, _) = reconcile(messages, &extracted, results);

        let positive_ids: Vec<&str> = buckets
            .positive
            .iter()
            .map(|m| m.message.id.as_str())
            .collect();
        let negative_ids: Vec<&str> = buckets
            .negative
            .iter()
            .map(|m| m.message.id.as_str())
            .collect();
        assert_eq!(positive_ids, ["a", "ccc"]);
        assert_eq!(negative_ids, ["bb", "dddd"]);
    }

    #[test]
    fn all_blank_input_lands_in_neutral_with_null_sentiment() {
        let messages = vec![message("a", Some("  ")), message("bb", None)];
        let extracted = extraction(&messages);

        let (buckets, counts) = reconcile(messages, &extracted, Vec::new());

        assert_eq!(counts.neutral, 2);
        assert!(buckets.neutral.iter().all(|m| m.sentiment.is_none()));
    }
}
