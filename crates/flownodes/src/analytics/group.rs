use super::{rating, require_records, round2};
use async_trait::async_trait;
use flowcore::value::stringify;
use flowcore::{Node, NodeContext, NodeError, NodeOutput, NodeTypeDefinition, ParameterSpec, Value};
use serde_json::json;
use std::collections::BTreeMap;

pub const NODE_TYPE: &str = "group-by";

pub fn definition() -> NodeTypeDefinition {
    NodeTypeDefinition::new(NODE_TYPE, "Group By")
        .with_description("Group records by a field and summarize each group")
        .with_group("analytics")
        .with_parameter(ParameterSpec::string("field", "cluster").required())
        .with_parameter(ParameterSpec::options("order", &["asc", "desc"], "asc"))
}

pub struct GroupByNode;

#[async_trait]
impl Node for GroupByNode {
    fn node_type(&self) -> &str {
        NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let field = ctx.str_or("field", "cluster");
        let order = ctx.str_or("order", "asc");
        let descending = match order {
            "asc" => false,
            "desc" => true,
            other => return Err(NodeError::unsupported("order", other)),
        };
        let records = require_records(&ctx)?;

        // Keys compare as strings, so "10" sorts before "2"
        let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for record in records {
            let key = stringify(record.get(field).unwrap_or(&Value::Null));
            groups.entry(key).or_default().push(record);
        }

        let mut groups: Vec<Value> = groups
            .into_iter()
            .map(|(key, records)| {
                let ratings: Vec<f64> = records.iter().filter_map(rating).collect();
                let avg_rating = if ratings.is_empty() {
                    Value::Null
                } else {
                    json!(round2(ratings.iter().sum::<f64>() / ratings.len() as f64))
                };
                json!({
                    "key": key,
                    "count": records.len(),
                    "avgRating": avg_rating,
                    "records": records,
                })
            })
            .collect();
        if descending {
            groups.reverse();
        }

        ctx.events.info(format!("Grouped records by {} into {} groups", field, groups.len()));

        Ok(NodeOutput::complete(json!({
            "field": field,
            "order": order,
            "groups": groups,
        })))
    }
}
