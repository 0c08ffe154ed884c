//! Built-in review analytics: fetch, cluster, group, summarize, export.
//!
//! These nodes do no network I/O. They pass records along as JSON objects
//! and read them from whatever shape the previous node produced.

pub mod cluster;
pub mod export;
pub mod group;
pub mod insights;
pub mod reviews;

use flowcore::value::as_number;
use flowcore::{NodeContext, NodeError, Value};

/// Keys under which an upstream object may carry its records
const RECORD_KEYS: &[&str] = &["records", "reviews", "groups", "data"];

/// Records carried by an upstream value: the value itself when it is an
/// array, else the first array found under one of the record keys.
pub fn records_from(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => RECORD_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

/// Non-empty upstream records, or `MissingInput`
pub(crate) fn require_records(ctx: &NodeContext) -> Result<Vec<Value>, NodeError> {
    let input = ctx.require_input("upstream records")?;
    records_from(input)
        .filter(|records| !records.is_empty())
        .cloned()
        .ok_or_else(|| NodeError::MissingInput(format!("{} found no records in its input", ctx.node_type)))
}

/// Expand grouped records (`{key, records}` items) back into a flat list
pub(crate) fn flatten_groups(records: Vec<Value>) -> Vec<Value> {
    records
        .into_iter()
        .flat_map(|item| match item.get("records").and_then(Value::as_array) {
            Some(inner) => inner.clone(),
            None => vec![item],
        })
        .collect()
}

pub(crate) fn rating(record: &Value) -> Option<f64> {
    record.get("rating").and_then(as_number)
}

pub(crate) fn text(record: &Value) -> &str {
    record.get("text").and_then(Value::as_str).unwrap_or("")
}

const POSITIVE: &[&str] = &[
    "amazing", "awesome", "best", "easy", "excellent", "fast", "friendly", "good", "great",
    "helpful", "intuitive", "love", "nice", "perfect", "reliable", "smooth", "useful",
];

const NEGATIVE: &[&str] = &[
    "annoying", "bad", "broken", "bug", "buggy", "confusing", "crash", "crashes", "expensive",
    "hate", "poor", "slow", "terrible", "useless", "worst", "freezes", "missing",
];

pub(crate) fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Lexicon score in `[-1, 1]`; zero when no sentiment word occurs
pub fn sentiment_score(text: &str) -> f64 {
    let (mut positive, mut negative) = (0u32, 0u32);
    for word in words(text) {
        if POSITIVE.contains(&word.as_str()) {
            positive += 1;
        } else if NEGATIVE.contains(&word.as_str()) {
            negative += 1;
        }
    }
    let total = positive + negative;
    if total == 0 {
        0.0
    } else {
        (positive as f64 - negative as f64) / total as f64
    }
}

/// Sentiment of a record: an explicit numeric `sentiment` field or the text score
pub(crate) fn record_sentiment(record: &Value) -> f64 {
    record
        .get("sentiment")
        .and_then(as_number)
        .unwrap_or_else(|| sentiment_score(text(record)))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_are_found_under_known_keys() {
        assert_eq!(records_from(&json!([1, 2])).map(Vec::len), Some(2));
        assert_eq!(records_from(&json!({"reviews": [1]})).map(Vec::len), Some(1));
        assert_eq!(records_from(&json!({"groups": [1, 2, 3]})).map(Vec::len), Some(3));
        assert!(records_from(&json!({"other": [1]})).is_none());
        assert!(records_from(&json!("text")).is_none());
    }

    #[test]
    fn sentiment_is_bounded() {
        assert_eq!(sentiment_score("Great app, love it"), 1.0);
        assert_eq!(sentiment_score("Slow and buggy"), -1.0);
        assert_eq!(sentiment_score("Good but slow"), 0.0);
        assert_eq!(sentiment_score("It is an app"), 0.0);
    }

    #[test]
    fn groups_flatten_to_records() {
        let flat = flatten_groups(vec![
            json!({"key": "0", "records": [{"id": 1}, {"id": 2}]}),
            json!({"id": 3}),
        ]);
        assert_eq!(flat.len(), 3);
    }
}
