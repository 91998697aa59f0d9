pub mod mock;
pub mod openai;

#[cfg(feature = "local")]
pub mod local;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export types that consumers will need to create and use tools
pub use serde_json::{Value, json};

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        })
    }
}

/// Information about a tool call from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallInfo {
    pub id: String,
    pub name: String,
    /// Usually a JSON object. Arguments the model sent that were not valid JSON are kept as
    /// a string so the tool can reject them.
    pub arguments: Value,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
        }
    }

    /// An assistant turn that only requests a tool call.
    pub fn tool_request(call: ToolCallInfo) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_call: Some(call),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A callable capability as presented to the model: name, description and a JSON schema
/// for its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Helper function to create a tool with the given name, description, and parameters
///
/// # Example
/// ```rust
/// use ai::{create_tool, json};
///
/// let tool = create_tool(
///     "run_query",
///     "Execute a SQL query against the database",
///     json!({
///         "type": "object",
///         "properties": {
///             "query": {
///                 "type": "string",
///                 "description": "The SQL query to execute",
///             },
///         },
///         "required": ["query"],
///     }),
/// );
/// assert_eq!(tool.name, "run_query");
/// ```
pub fn create_tool(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: Value,
) -> ToolSpec {
    ToolSpec {
        name: name.into(),
        description: description.into(),
        parameters,
    }
}

/// Everything the model sees for one completion.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

/// What the model produced: free text, tool call requests, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCallInfo>,
}

impl ModelTurn {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: vec![],
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            text: String::new(),
            tool_calls: vec![ToolCallInfo {
                id: new_call_id(),
                name: name.into(),
                arguments,
            }],
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("model request timed out")]
    Timeout,

    #[error("model provider rate limited the request")]
    RateLimited,

    #[error("model provider rejected the credentials: {0}")]
    Auth(String),

    #[error("could not reach the model provider: {0}")]
    Transport(String),

    #[error("model provider returned an unexpected response: {0}")]
    InvalidResponse(String),

    #[error("model backend unavailable: {0}")]
    Unavailable(String),
}

/// A reasoning model: given a transcript and a tool catalog, it either answers or asks for
/// a tool call.
#[async_trait]
pub trait ReasoningModel: Send + Sync + fmt::Debug {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelTurn, ModelError>;
}

/// Fresh identifier for a tool call the backend did not name.
pub fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Builds the configured backend.
pub async fn from_config(conf: &config::AIConfig) -> Result<Arc<dyn ReasoningModel>, ModelError> {
    match conf.provider {
        config::Provider::OpenAI | config::Provider::Azure => {
            Ok(Arc::new(openai::OpenAIModel::new(conf)?))
        }
        #[cfg(feature = "local")]
        config::Provider::Local => Ok(Arc::new(local::LocalModel::new(conf).await?)),
        #[cfg(not(feature = "local"))]
        config::Provider::Local => Err(ModelError::Unavailable(
            "built without the `local` feature".to_string(),
        )),
    }
}
