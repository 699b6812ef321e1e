use std::convert::Infallible;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream::{self, Stream};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{ChatOptions, ChatResult, LlmError, StructuredChat};
use crate::routes::fields::FormFields;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub data: ChatResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Value>,
}

/// Body of a 422: the model answered, but not with valid JSON.
#[derive(Debug, Serialize)]
pub struct ChatParseFailure {
    pub data: ChatResult,
    pub parsed: Option<Value>,
    pub parse_error: String,
}

fn missing_message() -> AppError {
    AppError::Validation("missing message".to_string())
}

/// Reads `system`, `temperature` and `max_tokens`. Unparseable numbers are
/// logged and ignored.
fn chat_options(fields: &FormFields) -> ChatOptions {
    let mut options = ChatOptions::default();

    if let Some(system) = fields.get("system") {
        options = options.with_system(system);
    }
    if let Some(raw) = fields.get("temperature") {
        match raw.trim().parse::<f32>() {
            Ok(temperature) if temperature.is_finite() => {
                options = options.with_temperature(temperature)
            }
            _ => warn!(value = raw, "ignoring invalid temperature"),
        }
    }
    if let Some(raw) = fields.get("max_tokens") {
        match raw.trim().parse::<u32>() {
            Ok(max_tokens) => options = options.with_max_tokens(max_tokens),
            Err(_) => warn!(value = raw, "ignoring invalid max_tokens"),
        }
    }

    options
}

/// POST /api/chat
///
/// Plain chat unless a server-side output schema is configured, in which
/// case the reply is also parsed as JSON.
pub async fn handle_chat(
    State(state): State<AppState>,
    fields: FormFields,
) -> Result<Response, AppError> {
    let message = fields.message().ok_or_else(missing_message)?;
    let options = chat_options(&fields);

    let Some(schema) = state.chat_schema.as_deref() else {
        let result = state.agent.chat(&message, &options).await?;
        info!(tokens = result.tokens, "chat completed");
        return Ok(Json(ChatResponse {
            data: result,
            parsed: None,
        })
        .into_response());
    };

    let options = options.with_output_schema(schema);
    match state.agent.chat_json(&message, &options).await {
        Ok(StructuredChat { result, parsed }) => {
            info!(tokens = result.tokens, "structured chat completed");
            Ok(Json(ChatResponse {
                data: result,
                parsed: Some(parsed),
            })
            .into_response())
        }
        Err(LlmError::OutputParse { result, source }) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ChatParseFailure {
                data: *result,
                parsed: None,
                parse_error: source.to_string(),
            }),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

fn delta_event(delta: &str) -> Event {
    // SSE cannot carry carriage returns.
    Event::default().data(delta.replace('\r', ""))
}

fn final_event(outcome: Result<ChatResult, LlmError>) -> Event {
    match outcome {
        Ok(result) => Event::default()
            .event("done")
            .json_data(&result)
            .unwrap_or_else(|_| Event::default().event("done")),
        Err(e) => {
            warn!("chat stream failed: {e}");
            Event::default()
                .event("error")
                .data(e.to_string().replace('\r', ""))
        }
    }
}

/// POST /api/chat/stream
///
/// Relays text deltas as SSE `data` events, then a `done` event carrying the
/// result or an `error` event. A client that disconnects stops the upstream
/// stream at the next delta.
pub async fn handle_chat_stream(
    State(state): State<AppState>,
    fields: FormFields,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let message = fields.message().ok_or_else(missing_message)?;
    let mut options = chat_options(&fields);
    if let Some(schema) = state.chat_schema.as_deref() {
        options = options.with_output_schema(schema);
    }

    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let agent = state.agent.clone();

    tokio::spawn(async move {
        let outcome = agent
            .chat_stream(&message, &options, |delta: &str| {
                tx.send(delta_event(delta)).is_ok()
            })
            .await;
        let _ = tx.send(final_event(outcome));
    });

    let events = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|event| (Ok::<_, Infallible>(event), rx))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> FormFields {
        FormFields::from_pairs(pairs)
    }

    #[test]
    fn test_chat_options_from_fields() {
        let options = chat_options(&fields(&[
            ("system", "be brief"),
            ("temperature", "0.2"),
            ("max_tokens", "128"),
        ]));
        assert_eq!(options.system.as_deref(), Some("be brief"));
        assert!((options.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(options.max_tokens, Some(128));
        assert!(options.output_schema.is_none());
    }

    #[test]
    fn test_invalid_numbers_are_ignored() {
        let options = chat_options(&fields(&[
            ("temperature", "warm"),
            ("max_tokens", "-5"),
        ]));
        let defaults = ChatOptions::default();
        assert!((options.temperature - defaults.temperature).abs() < f32::EPSILON);
        assert_eq!(options.max_tokens, None);
    }

    #[test]
    fn test_empty_fields_are_absent() {
        let options = chat_options(&fields(&[("system", ""), ("max_tokens", "")]));
        assert!(options.system.is_none());
        assert_eq!(options.max_tokens, None);
    }
}
