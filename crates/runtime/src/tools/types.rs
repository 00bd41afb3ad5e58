//! Tool definitions exposed to the model.
//!
//! A server's raw JSON Schema is lowered into a typed parameter list so
//! every provider can render argument types in its own dialect.

use mcp::Tool;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

/// Expected type of a tool argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "items", rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Array(Box<ParamKind>),
    Object,
    /// No usable type information.
    Any,
}

impl ParamKind {
    /// Read the `type` of a JSON Schema fragment.
    ///
    /// Nullable unions like `["string", "null"]` take the non-null member.
    pub fn from_schema(schema: &Value) -> Self {
        let ty = match schema.get("type") {
            Some(Value::String(ty)) => Some(ty.as_str()),
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|ty| *ty != "null"),
            _ => None,
        };

        match ty {
            Some("string") => Self::String,
            Some("number") => Self::Number,
            Some("integer") => Self::Integer,
            Some("boolean") => Self::Boolean,
            Some("object") => Self::Object,
            Some("array") => {
                let items = schema
                    .get("items")
                    .map(Self::from_schema)
                    .unwrap_or(Self::Any);
                Self::Array(Box::new(items))
            }
            _ => Self::Any,
        }
    }

    /// JSON Schema for this kind.
    pub fn to_schema(&self) -> Value {
        match self {
            Self::String => json!({"type": "string"}),
            Self::Number => json!({"type": "number"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Object => json!({"type": "object"}),
            Self::Array(items) => json!({"type": "array", "items": items.to_schema()}),
            Self::Any => json!({}),
        }
    }
}

/// One named argument of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub description: Option<String>,
    pub kind: ParamKind,
    pub required: bool,
}

/// A tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
}

impl ToolSpec {
    /// Lower an object schema's `properties` and `required` into parameters.
    ///
    /// Anything that isn't an object schema yields no parameters.
    pub fn parameters_from_schema(schema: Option<&Value>) -> Vec<Parameter> {
        let Some(properties) = schema
            .and_then(|s| s.get("properties"))
            .and_then(Value::as_object)
        else {
            return Vec::new();
        };

        let required: Vec<&str> = schema
            .and_then(|s| s.get("required"))
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        properties
            .iter()
            .map(|(name, property)| Parameter {
                name: name.clone(),
                description: property
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                kind: ParamKind::from_schema(property),
                required: required.contains(&name.as_str()),
            })
            .collect()
    }

    /// Render the parameters back into an object JSON Schema.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut schema = param.kind.to_schema();
            if let (Some(description), Some(obj)) = (&param.description, schema.as_object_mut()) {
                obj.insert("description".into(), Value::String(description.clone()));
            }
            properties.insert(param.name.clone(), schema);
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        let mut schema = json!({"type": "object", "properties": properties});
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

impl From<&Tool> for ToolSpec {
    fn from(tool: &Tool) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone().unwrap_or_default(),
            parameters: Self::parameters_from_schema(tool.input_schema.as_ref()),
        }
    }
}

/// The tools a conversation may call, in server order.
///
/// Built once per connection and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityManifest {
    specs: Vec<ToolSpec>,
}

impl CapabilityManifest {
    /// Build from a server's tool list. Duplicate names keep the first entry.
    pub fn from_tools<'a>(tools: impl IntoIterator<Item = &'a Tool>) -> Self {
        Self::from_specs(tools.into_iter().map(ToolSpec::from))
    }

    pub fn from_specs(specs: impl IntoIterator<Item = ToolSpec>) -> Self {
        let mut unique: Vec<ToolSpec> = Vec::new();
        for spec in specs {
            if unique.iter().any(|s| s.name == spec.name) {
                warn!(tool = %spec.name, "ignoring duplicate tool name");
                continue;
            }
            unique.push(spec);
        }
        Self { specs: unique }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.specs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, schema: Option<Value>) -> Tool {
        Tool {
            name: name.to_string(),
            description: Some(format!("{name} tool")),
            input_schema: schema,
        }
    }

    #[test]
    fn manifest_preserves_count_and_order() {
        let tools: Vec<Tool> = ["get_forecast", "get_alerts", "ping", "a_last"]
            .into_iter()
            .map(|n| tool(n, None))
            .collect();
        let manifest = CapabilityManifest::from_tools(&tools);

        assert_eq!(manifest.len(), 4);
        assert_eq!(
            manifest.names(),
            ["get_forecast", "get_alerts", "ping", "a_last"]
        );
    }

    #[test]
    fn empty_manifest() {
        let manifest = CapabilityManifest::from_tools(&Vec::<Tool>::new());
        assert!(manifest.is_empty());
        assert!(!manifest.contains("anything"));
    }

    #[test]
    fn duplicate_names_keep_first() {
        let mut second = tool("get_alerts", None);
        second.description = Some("shadow".into());
        let tools = vec![tool("get_alerts", None), second];
        let manifest = CapabilityManifest::from_tools(&tools);

        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("get_alerts").unwrap().description, "get_alerts tool");
    }

    #[test]
    fn schema_becomes_typed_parameters() {
        let schema = json!({
            "type": "object",
            "properties": {
                "latitude": {"type": "number", "description": "Latitude of the location"},
                "longitude": {"type": "number"},
                "days": {"type": ["integer", "null"]},
                "tags": {"type": "array", "items": {"type": "string"}},
                "raw": {}
            },
            "required": ["latitude", "longitude"]
        });
        let spec = ToolSpec::from(&tool("get_forecast", Some(schema)));

        let param = |name: &str| spec.parameters.iter().find(|p| p.name == name).unwrap();
        assert_eq!(param("latitude").kind, ParamKind::Number);
        assert_eq!(
            param("latitude").description.as_deref(),
            Some("Latitude of the location")
        );
        assert!(param("latitude").required);
        assert!(param("longitude").required);
        assert_eq!(param("days").kind, ParamKind::Integer);
        assert!(!param("days").required);
        assert_eq!(
            param("tags").kind,
            ParamKind::Array(Box::new(ParamKind::String))
        );
        assert_eq!(param("raw").kind, ParamKind::Any);
    }

    #[test]
    fn missing_schema_still_registers() {
        let mut bare = tool("ping", None);
        bare.description = None;
        let spec = ToolSpec::from(&bare);

        assert_eq!(spec.name, "ping");
        assert_eq!(spec.description, "");
        assert!(spec.parameters.is_empty());
        assert_eq!(spec.json_schema(), json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn json_schema_round_trips_types() {
        let spec = ToolSpec {
            name: "get_alerts".into(),
            description: "Get weather alerts for a US state".into(),
            parameters: vec![Parameter {
                name: "state".into(),
                description: Some("Two-letter US state code".into()),
                kind: ParamKind::String,
                required: true,
            }],
        };

        assert_eq!(
            spec.json_schema(),
            json!({
                "type": "object",
                "properties": {
                    "state": {"type": "string", "description": "Two-letter US state code"}
                },
                "required": ["state"]
            })
        );
    }
}
