//! Text-processing handlers: blocking run and SSE progress stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pipeline::{PipelineReport, ProgressEvent};

use crate::error::ApiResult;
use crate::models::{ProcessTextRequest, ProcessTextResponse, StreamParams};
use crate::state::AppState;

/// Handler for `POST /api/process-text`.
///
/// Runs the full pipeline and reports the fact count; progress events are
/// drained and discarded.
pub async fn process_text(
    State(state): State<AppState>,
    Json(request): Json<ProcessTextRequest>,
) -> ApiResult<Json<ProcessTextResponse>> {
    let text = request.text.trim().to_string();
    if text.is_empty() {
        return Ok(Json(ProcessTextResponse {
            status: "error".to_string(),
            message: "Text input is required".to_string(),
            facts_processed: 0,
        }));
    }

    let pipeline = state.pipeline().await?;
    let (tx, mut rx) = mpsc::channel(256);
    let run = tokio::spawn(pipeline.process_text(text, request.chunk_size, tx));
    while rx.recv().await.is_some() {}
    let report: PipelineReport = run.await.unwrap_or_default();

    Ok(Json(ProcessTextResponse {
        status: "success".to_string(),
        message: format!(
            "Successfully processed text and added {} facts to the graph",
            report.facts_processed
        ),
        facts_processed: report.facts_processed,
    }))
}

/// Aborts the producer task when the SSE stream is dropped, so a client
/// disconnect cancels processing.
struct AbortOnDrop(JoinHandle<PipelineReport>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn sse_event(event: &ProgressEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(payload) => Event::default().data(payload),
        Err(error) => Event::default().data(format!("{{\"type\":\"error\",\"message\":\"{error}\"}}")),
    }
}

/// Handler for `GET /api/process-text/stream`.
///
/// One producer task feeds a bounded queue; the stream drains it with a
/// 250 ms poll so producer completion is observed even if the final events
/// race the channel close.
pub async fn process_text_stream(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        let pipeline = match state.pipeline().await {
            Ok(pipeline) => pipeline,
            Err(error) => {
                yield Ok(sse_event(&ProgressEvent::error(format!(
                    "Failed to initialise pipeline: {error}"
                ))));
                return;
            }
        };

        yield Ok(sse_event(&ProgressEvent::info("Starting text processing pipeline...")));
        let sentence_count = pipeline::text::split_into_sentences(&params.text).len();
        if sentence_count > 0 {
            yield Ok(sse_event(&ProgressEvent::info(format!(
                "Detected {sentence_count} sentences to process"
            ))));
        }

        let (tx, mut rx) = mpsc::channel::<ProgressEvent>(256);
        let producer = AbortOnDrop(tokio::spawn(Arc::clone(&pipeline).process_text(
            params.text.trim().to_string(),
            params.chunk_size,
            tx,
        )));

        loop {
            match tokio::time::timeout(Duration::from_millis(250), rx.recv()).await {
                Ok(Some(event)) => yield Ok(sse_event(&event)),
                // Channel closed: every sender is gone, the run is over.
                Ok(None) => break,
                Err(_elapsed) => {
                    if producer.0.is_finished() {
                        while let Ok(event) = rx.try_recv() {
                            yield Ok(sse_event(&event));
                        }
                        break;
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
