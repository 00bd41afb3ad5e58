//! Google Gemini backend (`generateContent`).

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolOutcome,
    Usage,
};
use crate::tools::{ParamKind, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTools>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

/// One of `text`, `functionCall` or `functionResponse` is set. Unknown
/// keys (thought signatures, inline data) are ignored.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTools {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Gemini API backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// Override the models endpoint (proxies, gateways).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn message_to_api(msg: &Message) -> ApiContent {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        let parts = msg
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => ApiPart {
                    text: Some(text.clone()),
                    ..Default::default()
                },
                Part::ToolCall(call) => ApiPart {
                    function_call: Some(ApiFunctionCall {
                        id: None,
                        name: call.name.clone(),
                        args: call.input.clone(),
                    }),
                    ..Default::default()
                },
                Part::ToolResult(result) => {
                    let response = match &result.outcome {
                        ToolOutcome::Success { output } => json!({ "result": output }),
                        ToolOutcome::Failure { error } => json!({ "error": error }),
                    };
                    ApiPart {
                        function_response: Some(ApiFunctionResponse {
                            id: None,
                            name: result.name.clone(),
                            response,
                        }),
                        ..Default::default()
                    }
                }
            })
            .collect();

        ApiContent {
            role: Some(role.to_string()),
            parts,
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiFunctionDeclaration {
        let parameters = (!spec.parameters.is_empty()).then(|| {
            let mut properties = Map::new();
            for param in &spec.parameters {
                let mut schema = kind_to_schema(&param.kind);
                if let Some(description) = &param.description {
                    schema["description"] = Value::String(description.clone());
                }
                properties.insert(param.name.clone(), schema);
            }
            let required: Vec<&str> = spec
                .parameters
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.as_str())
                .collect();
            json!({"type": "OBJECT", "properties": properties, "required": required})
        });

        ApiFunctionDeclaration {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters,
        }
    }

    fn response_to_message(response: ApiResponse) -> Result<Message, ModelError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no candidates".into()))?;

        let parts = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| {
                if let Some(call) = part.function_call {
                    return Some(Part::ToolCall(ToolCall {
                        // Gemini doesn't always assign call ids.
                        id: call
                            .id
                            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                        name: call.name,
                        input: call.args,
                    }));
                }
                part.text.map(Part::Text)
            })
            .collect();

        Ok(Message {
            role: Role::Assistant,
            parts,
        })
    }
}

/// Gemini's OpenAPI-style schema uses upper-case type names.
///
/// Gemini rejects an OBJECT without `properties`, and nested shapes are not
/// carried in [`ParamKind`], so free-form objects travel as strings.
fn kind_to_schema(kind: &ParamKind) -> Value {
    match kind {
        ParamKind::String | ParamKind::Any | ParamKind::Object => json!({"type": "STRING"}),
        ParamKind::Number => json!({"type": "NUMBER"}),
        ParamKind::Integer => json!({"type": "INTEGER"}),
        ParamKind::Boolean => json!({"type": "BOOLEAN"}),
        ParamKind::Array(items) => json!({"type": "ARRAY", "items": kind_to_schema(items)}),
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl Backend for GeminiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let declarations: Vec<ApiFunctionDeclaration> =
            request.tools.iter().map(Self::tool_to_api).collect();
        let tools = if declarations.is_empty() {
            Vec::new()
        } else {
            vec![ApiTools {
                function_declarations: declarations,
            }]
        };

        let api_request = ApiRequest {
            contents: request.messages.iter().map(Self::message_to_api).collect(),
            tools,
            system_instruction: request.system.map(|s| ApiContent {
                role: None,
                parts: vec![ApiPart {
                    text: Some(s.to_string()),
                    ..Default::default()
                }],
            }),
            generation_config: ApiGenerationConfig {
                max_output_tokens: request.max_tokens,
            },
        };

        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::from_status(status, body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let usage = api_response
            .usage_metadata
            .as_ref()
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();
        let message = Self::response_to_message(api_response)?;

        Ok(ModelResponse { message, usage })
    }
}
