use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Result, StripError};
use crate::types::JobOverrides;

/// An API-format ComfyUI workflow with two addressable nodes: the model
/// loader and the image save node.
///
/// The template is never mutated. [`render`](WorkflowTemplate::render)
/// clones the graph and applies one checkpoint's overrides to the copy.
///
/// # Example
/// ```
/// use checkpoint_strip::{JobOverrides, WorkflowTemplate};
/// use serde_json::json;
///
/// let template = WorkflowTemplate::from_value(
///     json!({
///         "273": {"class_type": "UNETLoader", "inputs": {"unet_name": "base.safetensors"}},
///         "275": {"class_type": "SaveImage", "inputs": {"filename_prefix": "ComfyUI"}}
///     }),
///     "273",
///     "275",
/// )
/// .unwrap();
///
/// let job = template
///     .render(&JobOverrides {
///         unet_name: "run/checkpoint-100.safetensors".into(),
///         filename_prefix: "checkpoint-100".into(),
///         output_path: "2024-06-01_12-00-00".into(),
///     })
///     .unwrap();
/// assert_eq!(job["273"]["inputs"]["unet_name"], "run/checkpoint-100.safetensors");
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    graph: Map<String, Value>,
    loader_node: String,
    save_node: String,
}

impl WorkflowTemplate {
    /// Read and validate the template file.
    pub fn load(path: &Path, loader_node: &str, save_node: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StripError::io(format!("Cannot read workflow template {}", path.display()), e)
        })?;
        let value: Value = serde_json::from_str(&raw)?;
        Self::from_value(value, loader_node, save_node)
    }

    /// Validate an already-parsed graph.
    pub fn from_value(value: Value, loader_node: &str, save_node: &str) -> Result<Self> {
        let graph = match value {
            Value::Object(map) => map,
            _ => {
                return Err(StripError::Template(
                    "workflow must be a JSON object keyed by node id".into(),
                ))
            }
        };

        for node in [loader_node, save_node] {
            let inputs = graph
                .get(node)
                .ok_or_else(|| StripError::Template(format!("node {} not found", node)))?
                .get("inputs");
            if !inputs.map(Value::is_object).unwrap_or(false) {
                return Err(StripError::Template(format!(
                    "node {} has no inputs mapping",
                    node
                )));
            }
        }

        Ok(Self {
            graph,
            loader_node: loader_node.to_string(),
            save_node: save_node.to_string(),
        })
    }

    /// Id of the model loader node.
    pub fn loader_node(&self) -> &str {
        &self.loader_node
    }

    /// Id of the image save node.
    pub fn save_node(&self) -> &str {
        &self.save_node
    }

    /// Produce the job for one checkpoint.
    pub fn render(&self, overrides: &JobOverrides) -> Result<Value> {
        let mut graph = self.graph.clone();

        let loader = inputs_mut(&mut graph, &self.loader_node)?;
        loader.insert("unet_name".into(), Value::String(overrides.unet_name.clone()));

        let save = inputs_mut(&mut graph, &self.save_node)?;
        save.insert(
            "filename_prefix".into(),
            Value::String(overrides.filename_prefix.clone()),
        );
        save.insert(
            "output_path".into(),
            Value::String(overrides.output_path.clone()),
        );

        Ok(Value::Object(graph))
    }
}

fn inputs_mut<'a>(
    graph: &'a mut Map<String, Value>,
    node: &str,
) -> Result<&'a mut Map<String, Value>> {
    graph
        .get_mut(node)
        .and_then(|n| n.get_mut("inputs"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| StripError::Template(format!("node {} has no inputs mapping", node)))
}
