use super::{rating, record_sentiment, require_records, round2, text};
use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeOutput, NodeTypeDefinition, ParameterSpec, Value};
use serde_json::{json, Map};

pub const NODE_TYPE: &str = "kmeans-cluster";

const FEATURES: &[&str] = &["rating", "textLength", "sentiment"];

pub fn definition() -> NodeTypeDefinition {
    NodeTypeDefinition::new(NODE_TYPE, "K-Means Clustering")
        .with_description("Cluster records by rating, text length and sentiment")
        .with_group("analytics")
        .with_parameter(ParameterSpec::integer("k", 3).required())
        .with_parameter(ParameterSpec::multi_options("features", FEATURES, &["rating", "sentiment"]))
        .with_parameter(ParameterSpec::integer("maxIterations", 100))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feature {
    Rating,
    TextLength,
    Sentiment,
}

impl Feature {
    fn parse(name: &str) -> Result<Self, NodeError> {
        match name {
            "rating" => Ok(Feature::Rating),
            "textLength" => Ok(Feature::TextLength),
            "sentiment" => Ok(Feature::Sentiment),
            other => Err(NodeError::unsupported("features", other)),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Feature::Rating => "rating",
            Feature::TextLength => "textLength",
            Feature::Sentiment => "sentiment",
        }
    }

    fn extract(self, record: &Value) -> f64 {
        match self {
            Feature::Rating => rating(record).unwrap_or(0.0),
            Feature::TextLength => text(record).chars().count() as f64,
            Feature::Sentiment => record_sentiment(record),
        }
    }
}

/// Result of one k-means run over raw feature vectors
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub assignments: Vec<usize>,
    /// Centroids in the original feature units
    pub centroids: Vec<Vec<f64>>,
    pub iterations: usize,
}

/// Lloyd's algorithm over min-max normalized points.
///
/// Seeds are the points at evenly spaced indices, so the same input always
/// yields the same clustering. Stops once no assignment changes or after
/// `max_iterations` passes. `k` is clamped to the number of points.
pub fn kmeans(points: &[Vec<f64>], k: usize, max_iterations: usize) -> Clustering {
    let n = points.len();
    let dims = points.first().map(Vec::len).unwrap_or(0);
    let k = k.clamp(1, n.max(1));

    let mut min = vec![f64::INFINITY; dims];
    let mut max = vec![f64::NEG_INFINITY; dims];
    for point in points {
        for d in 0..dims {
            min[d] = min[d].min(point[d]);
            max[d] = max[d].max(point[d]);
        }
    }
    let span: Vec<f64> = (0..dims).map(|d| max[d] - min[d]).collect();
    let normalized: Vec<Vec<f64>> = points
        .iter()
        .map(|p| {
            (0..dims)
                .map(|d| if span[d] > 0.0 { (p[d] - min[d]) / span[d] } else { 0.0 })
                .collect()
        })
        .collect();

    let mut centroids: Vec<Vec<f64>> = (0..k)
        .filter_map(|i| normalized.get(i * n / k).cloned())
        .collect();
    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;

    while iterations < max_iterations.max(1) {
        iterations += 1;

        let mut changed = false;
        for (i, point) in normalized.iter().enumerate() {
            let nearest = nearest(point, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = normalized
                .iter()
                .zip(&assignments)
                .filter(|(_, a)| **a == c)
                .map(|(p, _)| p)
                .collect();
            // An emptied cluster keeps its previous centroid
            if members.is_empty() {
                continue;
            }
            for d in 0..dims {
                centroid[d] = members.iter().map(|p| p[d]).sum::<f64>() / members.len() as f64;
            }
        }
    }

    let centroids = centroids
        .into_iter()
        .map(|c| (0..dims).map(|d| min[d] + c[d] * span[d]).collect())
        .collect();

    Clustering {
        assignments,
        centroids,
        iterations,
    }
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let distance: f64 = point
            .iter()
            .zip(centroid)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

pub struct KMeansClusterNode;

impl KMeansClusterNode {
    fn features(ctx: &NodeContext) -> Result<Vec<Feature>, NodeError> {
        let Some(selected) = ctx.param("features") else {
            return Ok(vec![Feature::Rating, Feature::Sentiment]);
        };
        let names = selected.as_array().ok_or_else(|| NodeError::InvalidParameter {
            name: "features".to_string(),
            expected: "array".to_string(),
            actual: flowcore::value::type_name(selected).to_string(),
        })?;
        let mut features = Vec::new();
        for name in names {
            let feature = Feature::parse(name.as_str().unwrap_or_default())?;
            if !features.contains(&feature) {
                features.push(feature);
            }
        }
        Ok(features)
    }
}

#[async_trait]
impl Node for KMeansClusterNode {
    fn node_type(&self) -> &str {
        NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let k = ctx.number_or("k", 3.0);
        if k < 1.0 {
            return Err(NodeError::InvalidParameter {
                name: "k".to_string(),
                expected: "positive integer".to_string(),
                actual: k.to_string(),
            });
        }
        let features = Self::features(&ctx)?;
        let max_iterations = ctx.number_or("maxIterations", 100.0).max(1.0) as usize;
        let records = require_records(&ctx)?;

        let points: Vec<Vec<f64>> = records
            .iter()
            .map(|r| features.iter().map(|f| f.extract(r)).collect())
            .collect();
        let clustering = kmeans(&points, k as usize, max_iterations);

        ctx.events.info(format!(
            "Clustered {} records into {} clusters in {} iterations",
            records.len(),
            clustering.centroids.len(),
            clustering.iterations
        ));

        let centroids: Vec<Value> = clustering
            .centroids
            .iter()
            .enumerate()
            .map(|(i, center)| {
                let size = clustering.assignments.iter().filter(|a| **a == i).count();
                json!({
                    "cluster": i,
                    "size": size,
                    "center": feature_map(&features, center),
                })
            })
            .collect();

        let records: Vec<Value> = records
            .into_iter()
            .zip(&points)
            .zip(&clustering.assignments)
            .map(|((record, point), cluster)| {
                let mut record = match record {
                    Value::Object(map) => map,
                    other => Map::from_iter([("value".to_string(), other)]),
                };
                record.insert("cluster".to_string(), json!(cluster));
                record.insert("features".to_string(), feature_map(&features, point));
                Value::Object(record)
            })
            .collect();

        Ok(NodeOutput::complete(json!({
            "k": clustering.centroids.len(),
            "features": features.iter().map(|f| f.name()).collect::<Vec<_>>(),
            "iterations": clustering.iterations,
            "centroids": centroids,
            "records": records,
        })))
    }
}

fn feature_map(features: &[Feature], values: &[f64]) -> Value {
    Value::Object(
        features
            .iter()
            .zip(values)
            .map(|(f, v)| (f.name().to_string(), json!(round2(*v))))
            .collect(),
    )
}
