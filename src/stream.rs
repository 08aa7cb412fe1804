//! Run events and their `text/event-stream` encoding.

use crate::models::{EvaluationResults, ProgressEvent};
use axum::response::sse::Event;
use serde::Serialize;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::error;

/// Payload of the last data frame of a stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// What a quantitative run reports while it executes
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Progress(ProgressEvent),
    Final(EvaluationResults),
    Done,
}

#[derive(Serialize)]
struct FinalPayload<'a> {
    results: &'a EvaluationResults,
}

impl RunEvent {
    /// The `data:` payload for this event
    pub fn data(&self) -> Result<String, serde_json::Error> {
        match self {
            RunEvent::Progress(progress) => serde_json::to_string(progress),
            RunEvent::Final(results) => serde_json::to_string(&FinalPayload { results }),
            RunEvent::Done => Ok(DONE_SENTINEL.to_string()),
        }
    }

    fn into_sse(self) -> Event {
        match self.data() {
            Ok(data) => Event::default().data(data),
            Err(err) => {
                error!("Failed to serialize run event: {}", err);
                Event::default().data(r#"{"error":"Failed to serialize event"}"#)
            }
        }
    }
}

/// Adapt a run's event channel into an SSE body stream
pub fn event_stream(
    events: mpsc::UnboundedReceiver<RunEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    UnboundedReceiverStream::new(events).map(|event| Ok(event.into_sse()))
}
