use super::{flatten_groups, rating, record_sentiment, require_records, round2, text, words};
use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeOutput, NodeTypeDefinition, ParameterSpec, Value};
use serde_json::{json, Map};
use std::collections::{BTreeMap, HashMap};

pub const NODE_TYPE: &str = "generate-insights";

const ANALYSES: &[&str] = &["sentiment", "topics", "keywords", "trend"];

const TOPICS: &[(&str, &[&str])] = &[
    ("performance", &["slow", "fast", "crash", "crashes", "lag", "freezes", "speed", "battery"]),
    ("usability", &["easy", "intuitive", "confusing", "interface", "design", "layout", "ui"]),
    ("pricing", &["price", "expensive", "cheap", "subscription", "cost", "charged", "free"]),
    ("support", &["support", "help", "helpful", "response", "service", "team"]),
    ("features", &["feature", "update", "option", "missing", "export", "sync", "reminders"]),
];

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "but", "with", "this", "that", "was", "are", "have", "has", "had",
    "not", "you", "your", "its", "it's", "from", "what", "when", "would", "like", "very",
    "every", "time", "since", "last", "too", "app", "all", "can", "just", "really", "does",
    "overall", "first", "new", "my", "our", "out", "any", "one", "use",
];

pub fn definition() -> NodeTypeDefinition {
    NodeTypeDefinition::new(NODE_TYPE, "Generate Insights")
        .with_description("Summarize sentiment, topics, keywords and rating trend")
        .with_group("analytics")
        .with_parameter(ParameterSpec::multi_options("analyses", ANALYSES, ANALYSES))
        .with_parameter(ParameterSpec::integer("topKeywords", 10))
}

pub struct GenerateInsightsNode;

impl GenerateInsightsNode {
    fn analyses(ctx: &NodeContext) -> Result<Vec<&'static str>, NodeError> {
        let Some(selected) = ctx.param("analyses").and_then(Value::as_array) else {
            return Ok(ANALYSES.to_vec());
        };
        let mut analyses = Vec::new();
        for item in selected {
            let name = item.as_str().unwrap_or_default();
            let known = ANALYSES
                .iter()
                .find(|a| **a == name)
                .ok_or_else(|| NodeError::unsupported("analyses", name))?;
            if !analyses.contains(known) {
                analyses.push(*known);
            }
        }
        Ok(analyses)
    }
}

#[async_trait]
impl Node for GenerateInsightsNode {
    fn node_type(&self) -> &str {
        NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let analyses = Self::analyses(&ctx)?;
        let top = ctx.number_or("topKeywords", 10.0).max(0.0) as usize;
        let records = flatten_groups(require_records(&ctx)?);

        let mut summary = Map::new();
        summary.insert("recordCount".to_string(), json!(records.len()));
        for analysis in analyses {
            let facet = match analysis {
                "sentiment" => sentiment(&records),
                "topics" => topics(&records),
                "keywords" => keywords(&records, top),
                _ => trend(&records),
            };
            summary.insert(analysis.to_string(), facet);
        }

        ctx.events.info(format!("Generated insights for {} records", records.len()));
        Ok(NodeOutput::complete(Value::Object(summary)))
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn sentiment(records: &[Value]) -> Value {
    let scores: Vec<f64> = records.iter().map(record_sentiment).collect();
    let ratings: Vec<f64> = records.iter().filter_map(rating).collect();
    json!({
        "average": round2(mean(&scores).unwrap_or(0.0)),
        "positive": scores.iter().filter(|s| **s > 0.1).count(),
        "neutral": scores.iter().filter(|s| (-0.1..=0.1).contains(*s)).count(),
        "negative": scores.iter().filter(|s| **s < -0.1).count(),
        "averageRating": mean(&ratings).map(round2),
    })
}

fn topics(records: &[Value]) -> Value {
    let mut mentions: Vec<(&str, usize)> = TOPICS
        .iter()
        .map(|(topic, terms)| {
            let count = records
                .iter()
                .filter(|r| words(text(r)).any(|w| terms.contains(&w.as_str())))
                .count();
            (*topic, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect();
    mentions.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    Value::Array(
        mentions
            .into_iter()
            .map(|(topic, count)| json!({"topic": topic, "mentions": count}))
            .collect(),
    )
}

fn keywords(records: &[Value], top: usize) -> Value {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        for word in words(text(record)) {
            if word.len() >= 3 && !STOPWORDS.contains(&word.as_str()) && !word.chars().all(char::is_numeric) {
                *counts.entry(word).or_default() += 1;
            }
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top);
    Value::Array(
        ranked
            .into_iter()
            .map(|(word, count)| json!({"word": word, "count": count}))
            .collect(),
    )
}

/// Rating per day, and whether the later half of the period rates higher
fn trend(records: &[Value]) -> Value {
    let mut by_date: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        let Some(date) = record.get("date").and_then(Value::as_str) else {
            continue;
        };
        let day: String = date.chars().take(10).collect();
        let entry = by_date.entry(day).or_default();
        if let Some(r) = rating(record) {
            entry.push(r);
        }
    }

    let points: Vec<Value> = by_date
        .iter()
        .map(|(date, ratings)| {
            json!({
                "date": date,
                "count": ratings.len(),
                "avgRating": mean(ratings).map(round2),
            })
        })
        .collect();

    let daily: Vec<f64> = by_date.values().filter_map(|r| mean(r)).collect();
    let direction = if daily.len() < 2 {
        "stable"
    } else {
        let (earlier, later) = daily.split_at(daily.len() / 2);
        let delta = mean(later).unwrap_or(0.0) - mean(earlier).unwrap_or(0.0);
        if delta > 0.25 {
            "improving"
        } else if delta < -0.25 {
            "declining"
        } else {
            "stable"
        }
    };

    json!({ "direction": direction, "points": points })
}
