use async_trait::async_trait;
use chrono::{Duration, Utc};
use flowcore::{Node, NodeContext, NodeError, NodeOutput, NodeTypeDefinition, ParameterSpec, Value};
use serde_json::json;

pub const NODE_TYPE: &str = "review-fetch";

const MAX_REVIEWS: usize = 100;

const SOURCES: &[&str] = &["app-store", "google-play", "trustpilot"];

/// Rating and text pairs the generated reviews cycle through
const SAMPLES: &[(u8, &str)] = &[
    (5, "Great app, love the new design and it is fast"),
    (4, "Really useful for tracking my budget, easy to set up"),
    (2, "Crashes every time I open the settings page"),
    (1, "Terrible support, my subscription was charged twice"),
    (3, "Does the job but the interface is confusing at first"),
    (5, "Excellent sync between devices, very reliable"),
    (2, "Too expensive for what it offers, missing export feature"),
    (4, "Helpful reminders and a nice clean layout"),
    (1, "Slow and buggy since the last update"),
    (3, "Okay overall, would like an option for dark mode"),
];

const AUTHORS: &[&str] = &["Alex", "Sam", "Jordan", "Taylor", "Morgan", "Casey", "Riley"];

pub fn definition() -> NodeTypeDefinition {
    NodeTypeDefinition::new(NODE_TYPE, "Fetch Reviews")
        .with_description("Fetch customer reviews from an app store or review site")
        .with_group("analytics")
        .with_group("input")
        .with_parameter(ParameterSpec::options("source", SOURCES, "app-store").required())
        .with_parameter(ParameterSpec::integer("limit", 50).describe("At most 100 reviews"))
}

/// Placeholder review source: generates a deterministic review set
pub struct ReviewFetchNode;

impl ReviewFetchNode {
    pub fn generate(source: &str, limit: usize) -> Vec<Value> {
        let today = Utc::now().date_naive();
        (0..limit.min(MAX_REVIEWS))
            .map(|i| {
                let (rating, text) = SAMPLES[i % SAMPLES.len()];
                let author = AUTHORS[i % AUTHORS.len()];
                json!({
                    "id": format!("{}-{}", source, i + 1),
                    "source": source,
                    "author": format!("{} {}", author, (i / AUTHORS.len()) + 1),
                    "rating": rating,
                    "text": text,
                    "date": (today - Duration::days((i / 3) as i64)).to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Node for ReviewFetchNode {
    fn node_type(&self) -> &str {
        NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let source = ctx.require_param("source")?.as_str().unwrap_or_default();
        if !SOURCES.contains(&source) {
            return Err(NodeError::unsupported("source", source));
        }
        let limit = ctx.number_or("limit", 50.0).max(0.0) as usize;

        let reviews = Self::generate(source, limit);
        ctx.events.info(format!("Generated {} reviews for {}", reviews.len(), source));

        Ok(NodeOutput::degraded(
            reviews,
            format!("{} is a placeholder source, reviews are generated", source),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limit_is_capped() {
        let ctx = NodeContext::detached(NODE_TYPE)
            .with_parameter("source", "google-play")
            .with_parameter("limit", 500);
        let output = ReviewFetchNode.execute(ctx).await.unwrap();
        assert!(output.is_degraded());
        let reviews = output.data().as_array().unwrap();
        assert_eq!(reviews.len(), 100);
        assert_eq!(reviews[0]["id"], "google-play-1");
        for field in ["id", "source", "author", "rating", "text", "date"] {
            assert!(reviews[0].get(field).is_some(), "missing {field}");
        }
    }

    #[tokio::test]
    async fn unknown_source_is_unsupported() {
        let ctx = NodeContext::detached(NODE_TYPE).with_parameter("source", "yelp");
        let err = ReviewFetchNode.execute(ctx).await.unwrap_err();
        assert_eq!(err, NodeError::unsupported("source", "yelp"));
    }
}
