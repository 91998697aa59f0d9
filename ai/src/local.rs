//! In-process model through mistral.rs.
//!
//! mistral.rs has no notion of a structured assistant tool-call turn in plain chat history,
//! so earlier tool requests and results are replayed as JSON text.

use std::collections::HashMap;
use std::fmt;

use mistralrs::{
    Function, Model, ModelDType, RequestBuilder, Response, TextMessageRole, TextModelBuilder,
    Tool, ToolChoice, ToolType,
};
use serde_json::{Value, json};

use crate::{ModelError, ModelRequest, ModelTurn, ReasoningModel, Role, ToolCallInfo, ToolSpec};

pub struct LocalModel {
    model: Model,
    name: String,
}

impl fmt::Debug for LocalModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalModel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl LocalModel {
    pub async fn new(conf: &config::AIConfig) -> Result<Self, ModelError> {
        tracing::info!(model = %conf.model, "loading local model");
        let model = TextModelBuilder::new(conf.model.clone())
            .with_dtype(ModelDType::Auto)
            .build()
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        Ok(Self {
            model,
            name: conf.model.clone(),
        })
    }
}

fn to_tool(spec: &ToolSpec) -> Tool {
    let parameters: Option<HashMap<String, Value>> =
        serde_json::from_value(spec.parameters.clone()).ok();
    Tool {
        tp: ToolType::Function,
        function: Function {
            name: spec.name.clone(),
            description: Some(spec.description.clone()),
            parameters,
        },
    }
}

#[async_trait::async_trait]
impl ReasoningModel for LocalModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelTurn, ModelError> {
        let request_builder = request.messages.iter().fold(
            RequestBuilder::new().add_message(TextMessageRole::System, request.system),
            |builder, message| match (message.role, &message.tool_call) {
                (Role::User, _) => builder.add_message(TextMessageRole::User, &message.content),
                (Role::Assistant, Some(call)) => builder.add_message(
                    TextMessageRole::Assistant,
                    json!({
                        "tool_call": {
                            "id": call.id,
                            "name": call.name,
                            "arguments": call.arguments,
                        }
                    })
                    .to_string(),
                ),
                (Role::Assistant, None) => {
                    builder.add_message(TextMessageRole::Assistant, &message.content)
                }
                (Role::Tool, _) => builder.add_message(
                    TextMessageRole::Tool,
                    json!({
                        "tool_call_id": message.tool_call_id,
                        "content": message.content,
                    })
                    .to_string(),
                ),
            },
        );

        let request_builder = if request.tools.is_empty() {
            request_builder
        } else {
            request_builder
                .set_tools(request.tools.iter().map(to_tool).collect())
                .set_tool_choice(ToolChoice::Auto)
        };

        let mut stream = self
            .model
            .stream_chat_request(request_builder)
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        let mut turn = ModelTurn::default();

        while let Some(response) = stream.next().await {
            fold_response(&mut turn, response)?;
        }

        Ok(turn)
    }
}

/// Adds one streamed response to `turn`. Failures reported inside the stream end the turn.
fn fold_response(turn: &mut ModelTurn, response: Response) -> Result<(), ModelError> {
    match response {
        Response::Chunk(chunk_response) => {
            let Some(choice) = chunk_response.choices.first() else {
                return Ok(());
            };
            if let Some(content) = &choice.delta.content {
                turn.text.push_str(content);
            }
            if let Some(tool) = &choice.delta.tool_calls
                && let Some(call) = tool.first()
            {
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
                turn.tool_calls.push(ToolCallInfo {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments,
                });
            }
            Ok(())
        }
        Response::ModelError(message, _) => Err(ModelError::Unavailable(message)),
        Response::InternalError(err) => Err(ModelError::Unavailable(err.to_string())),
        Response::ValidationError(err) => Err(ModelError::InvalidResponse(err.to_string())),
        _ => Ok(()),
    }
}
