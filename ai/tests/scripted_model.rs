use std::time::Duration;

use ai::mock::ScriptedModel;
use ai::{Message, ModelError, ModelRequest, ModelTurn, ReasoningModel, create_tool, json};

fn request<'a>(messages: &'a [Message], tools: &'a [ai::ToolSpec]) -> ModelRequest<'a> {
    ModelRequest {
        system: "be brief",
        messages,
        tools,
    }
}

#[tokio::test]
async fn replays_the_script_in_order() {
    let model = ScriptedModel::new([
        Ok(ModelTurn::tool_call("list_tables", json!({}))),
        Err(ModelError::Timeout),
        Ok(ModelTurn::answer("done")),
    ]);
    let messages = [Message::user("hi")];

    let first = model.complete(request(&messages, &[])).await.unwrap();
    assert_eq!(first.tool_calls[0].name, "list_tables");
    assert_eq!(
        model.complete(request(&messages, &[])).await,
        Err(ModelError::Timeout)
    );
    assert_eq!(
        model.complete(request(&messages, &[])).await.unwrap().text,
        "done"
    );
    assert!(matches!(
        model.complete(request(&messages, &[])).await,
        Err(ModelError::Unavailable(_))
    ));
    assert_eq!(model.calls(), 4);
}

#[tokio::test]
async fn repeating_turns_get_fresh_call_ids() {
    let model = ScriptedModel::repeating(ModelTurn::tool_call("list_tables", json!({})));
    let messages = [Message::user("hi")];

    let a = model.complete(request(&messages, &[])).await.unwrap();
    let b = model.complete(request(&messages, &[])).await.unwrap();
    assert_ne!(a.tool_calls[0].id, b.tool_calls[0].id);
}

#[tokio::test]
async fn records_what_the_model_was_shown() {
    let model = ScriptedModel::repeating(ModelTurn::answer("ok")).with_delay(Duration::from_millis(1));
    let tools = [create_tool("run_query", "Run a query", json!({ "type": "object" }))];
    let messages = [Message::assistant("hello"), Message::user("count orders")];

    model.complete(request(&messages, &tools)).await.unwrap();

    let recorded = model.requests();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].system, "be brief");
    assert_eq!(recorded[0].messages, messages.to_vec());
    assert_eq!(recorded[0].tool_names, vec!["run_query"]);
}
