//! Function-calling ask loop.
//!
//! Per loop: the model picks a tool, the tool runs against the graph, and
//! a validator call judges whether the result answers the question. An
//! invalid answer feeds back as intermediate guidance for the next loop.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use llm::{ChatMessage, ResponseFormat};

use crate::error::{ApiError, ApiResult};
use crate::models::{AskRequest, AskResponse, ToolTraceEntry};
use crate::state::AppState;
use crate::tools::{execute_tool, tool_definitions};

const MAX_LOOPS: usize = 5;

fn system_prompt() -> &'static str {
    "You are a function-calling assistant that can call tools to answer questions about a graph. \
     Choose a single tool and provide arguments as needed. \
     When deciding spatial/temporal unconstrained flags: if a question asks with certainty \
     (e.g. 'Who is alive in 2020?'), do NOT include unconstrained results. If a question is \
     hypothetical or possibility-based (e.g. 'Who could have been alive in 2020?'), include \
     unconstrained results as well."
}

fn validation_prompt() -> &'static str {
    "You validate whether the latest tool result answers the original user question. \
     Respond strictly as JSON with keys: valid (boolean) and descriptor (string)."
}

/// Handler for `POST /api/query/ask`.
pub async fn ask_query(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> ApiResult<Json<AskResponse>> {
    let pipeline = state.pipeline().await?;
    let store = pipeline
        .store()
        .ok_or_else(|| ApiError::Unavailable("graph store is not connected".to_string()))?;
    let client = pipeline.llm();
    let model = pipeline.models().ask.as_str();
    let tools = tool_definitions();

    let loops = request.max_loops.clamp(1, MAX_LOOPS);
    let mut intermediate = String::new();
    let mut trace: Vec<ToolTraceEntry> = Vec::new();

    for loop_index in 0..loops {
        let mut messages = vec![
            ChatMessage::system(system_prompt()),
            ChatMessage::user(request.message.clone()),
        ];
        if !intermediate.is_empty() {
            messages.push(ChatMessage::system(format!(
                "Intermediate guidance: {intermediate}"
            )));
        }

        let assistant = client
            .chat_full(model, messages, &tools, Some("auto"))
            .await?;
        let Some(tool_call) = assistant.tool_calls.into_iter().next() else {
            return Ok(Json(AskResponse {
                status: "success".to_string(),
                valid: false,
                descriptor: "Model did not select a tool".to_string(),
                tool_trace: trace,
            }));
        };

        let tool_name = tool_call.function.name;
        let args: Value =
            serde_json::from_str(&tool_call.function.arguments).unwrap_or_else(|_| json!({}));
        let result = execute_tool(&tool_name, &args, store).await;
        trace.push(ToolTraceEntry {
            loop_index,
            tool: tool_name.clone(),
            args: args.clone(),
            result: result.clone(),
        });

        let validation_messages = vec![
            ChatMessage::system(validation_prompt()),
            ChatMessage::user(request.message.clone()),
            ChatMessage::system(
                json!({"tool": tool_name, "args": args, "result": result}).to_string(),
            ),
        ];
        let verdict = client
            .chat(model, validation_messages, Some(ResponseFormat::JsonObject))
            .await?;
        let verdict: Value = serde_json::from_str(verdict.trim()).unwrap_or_else(|_| {
            json!({"valid": false, "descriptor": "Validator returned invalid JSON"})
        });

        let valid = verdict["valid"].as_bool().unwrap_or(false);
        let descriptor = verdict["descriptor"].as_str().unwrap_or("").to_string();
        if valid {
            return Ok(Json(AskResponse {
                status: "success".to_string(),
                valid: true,
                descriptor,
                tool_trace: trace,
            }));
        }
        intermediate = descriptor;
    }

    Ok(Json(AskResponse {
        status: "success".to_string(),
        valid: false,
        descriptor: if intermediate.is_empty() {
            "No valid answer found".to_string()
        } else {
            intermediate
        },
        tool_trace: trace,
    }))
}
