//! Question answering endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse, StatusResponse, TokenEvent};

/// POST /query - Answer a question in one response
pub async fn query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();
    let question = question_from(payload)?;
    tracing::info!("Query: \"{}\"", question);

    let pipeline = state.pipeline().await?;
    let answer = pipeline.chain.answer(&question).await?;

    tracing::info!("Query completed in {}ms", start.elapsed().as_millis());
    Ok(Json(QueryResponse::success(answer)))
}

/// POST /query/stream - Answer a question as server-sent events
///
/// Emits `token` events as the model produces text, then exactly one of
/// `done` (with the full answer) or `error`.
pub async fn query_stream(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let question = question_from(payload)?;
    tracing::info!("Streaming query: \"{}\"", question);

    let pipeline = state.pipeline().await?;
    let mut tokens = pipeline.chain.answer_stream(&question).await?;

    let stream = async_stream::stream! {
        let start = Instant::now();
        let mut answer = String::new();

        while let Some(token) = tokens.next().await {
            match token {
                Ok(content) => {
                    answer.push_str(&content);
                    yield Ok(json_event("token", &TokenEvent { content }));
                }
                Err(e) => {
                    tracing::error!("Stream failed after {} chars: {}", answer.len(), e);
                    yield Ok(json_event("error", &StatusResponse::error(e.to_string())));
                    return;
                }
            }
        }

        tracing::info!("Streaming query completed in {}ms", start.elapsed().as_millis());
        yield Ok(json_event("done", &QueryResponse::success(answer)));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn question_from(payload: std::result::Result<Json<QueryRequest>, JsonRejection>) -> Result<String> {
    let Json(request) =
        payload.map_err(|e| Error::validation(format!("Invalid request body: {}", e.body_text())))?;
    request.validated_question()
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(payload)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}
