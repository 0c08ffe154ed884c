use async_trait::async_trait;
use flowcore::value::stringify;
use flowcore::{Node, NodeContext, NodeError, NodeOutput, NodeTypeDefinition, ParameterSpec, Value};
use serde_json::json;

pub const NODE_TYPE: &str = "sheet-export";

pub fn definition() -> NodeTypeDefinition {
    NodeTypeDefinition::new(NODE_TYPE, "Export to Sheet Rows")
        .with_description("Flatten a summary into two-column rows for a spreadsheet")
        .with_group("analytics")
        .with_group("data")
        .with_parameter(ParameterSpec::boolean("includeHeader", true))
}

/// Turns the upstream facet map into `[key, value]` rows.
///
/// The output's `values` key is what `google-sheets` picks up for
/// append and update when it has no `values` parameter of its own.
pub struct SheetExportNode;

#[async_trait]
impl Node for SheetExportNode {
    fn node_type(&self) -> &str {
        NODE_TYPE
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let input = ctx.require_input("a summary to export")?;
        let mut rows: Vec<Value> = match input {
            Value::Object(facets) if !facets.is_empty() => facets
                .iter()
                .map(|(key, value)| json!([key, stringify(value)]))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, value)| json!([i.to_string(), stringify(value)]))
                .collect(),
            _ => {
                return Err(NodeError::MissingInput(format!(
                    "{} requires an object or array input",
                    NODE_TYPE
                )))
            }
        };
        if ctx.bool_or("includeHeader", true) {
            rows.insert(0, json!(["Metric", "Value"]));
        }

        Ok(NodeOutput::complete(json!({
            "rowCount": rows.len(),
            "values": rows,
        })))
    }
}
