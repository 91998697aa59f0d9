//! `OpenAI`-compatible chat completions backend.
//!
//! Talks to anything that speaks `/chat/completions` with function tools: `OpenAI` itself,
//! `Ollama` and `vLLM` servers, and Azure `OpenAI` deployments.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{Message, ModelError, ModelRequest, ModelTurn, ReasoningModel, Role, ToolCallInfo};

const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";
const ERROR_BODY_PREVIEW_CHARS: usize = 300;

enum Auth {
    None,
    Bearer(String),
    AzureKey(String),
}

pub struct OpenAIModel {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    auth: Auth,
}

impl fmt::Debug for OpenAIModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth = match self.auth {
            Auth::None => "none",
            Auth::Bearer(_) => "bearer",
            Auth::AzureKey(_) => "azure-key",
        };
        f.debug_struct("OpenAIModel")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("auth", &auth)
            .finish_non_exhaustive()
    }
}

impl OpenAIModel {
    pub fn new(conf: &config::AIConfig) -> Result<Self, ModelError> {
        let base = conf.url.trim_end_matches('/');

        let (endpoint, auth) = match conf.provider {
            config::Provider::Azure => {
                let key = conf
                    .require_api_key()
                    .map_err(|e| ModelError::Auth(e.to_string()))?;
                let version = conf
                    .api_version
                    .as_deref()
                    .unwrap_or(DEFAULT_AZURE_API_VERSION);
                (
                    format!(
                        "{base}/openai/deployments/{}/chat/completions?api-version={version}",
                        conf.model
                    ),
                    Auth::AzureKey(key),
                )
            }
            _ => (
                format!("{base}/chat/completions"),
                conf.api_key().map_or(Auth::None, Auth::Bearer),
            ),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(conf.timeout_secs))
            .build()
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            model: conf.model.clone(),
            temperature: conf.temperature,
            auth,
        })
    }
}

#[async_trait::async_trait]
impl ReasoningModel for OpenAIModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelTurn, ModelError> {
        let body = request_body(&self.model, self.temperature, &request);
        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            "requesting chat completion"
        );

        let builder = self.client.post(&self.endpoint).json(&body);
        let builder = match &self.auth {
            Auth::None => builder,
            Auth::Bearer(key) => builder.bearer_auth(key),
            Auth::AzureKey(key) => builder.header("api-key", key),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout
            } else {
                ModelError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let data: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout
            } else {
                ModelError::InvalidResponse(e.to_string())
            }
        })?;

        parse_response(data)
    }
}

fn status_error(status: StatusCode, body: &str) -> ModelError {
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::Auth(preview),
        StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ModelError::Timeout,
        _ => ModelError::Transport(format!("HTTP {status}: {preview}")),
    }
}

fn request_body(model: &str, temperature: f32, request: &ModelRequest<'_>) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(json!({ "role": "system", "content": request.system }));
    messages.extend(request.messages.iter().map(wire_message));

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
    });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
        body["tool_choice"] = json!("auto");
    }

    body
}

fn wire_message(message: &Message) -> Value {
    match (message.role, &message.tool_call) {
        (Role::User, _) => json!({ "role": "user", "content": message.content }),
        (Role::Assistant, Some(call)) => {
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                json!(message.content)
            };
            json!({
                "role": "assistant",
                "content": content,
                "tool_calls": [{
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": arguments_string(&call.arguments),
                    }
                }]
            })
        }
        (Role::Assistant, None) => json!({ "role": "assistant", "content": message.content }),
        (Role::Tool, _) => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
    }
}

fn arguments_string(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

fn parse_response(data: ChatResponse) -> Result<ModelTurn, ModelError> {
    let Some(choice) = data.choices.into_iter().next() else {
        return Err(ModelError::InvalidResponse("no choices returned".to_string()));
    };

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCallInfo {
            id: call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(crate::new_call_id),
            name: call.function.name,
            arguments: parse_arguments(call.function.arguments.as_deref()),
        })
        .collect();

    Ok(ModelTurn {
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
    })
}

fn parse_arguments(raw: Option<&str>) -> Value {
    match raw.map(str::trim) {
        None | Some("") => json!({}),
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}
