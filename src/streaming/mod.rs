//! Streaming Transport (spec §4.K): the typed event sequence a client
//! receives over a long-lived unidirectional stream while a run is in
//! flight.
//!
//! Grounded in the teacher's `channels::cli` TUI channel, which streams
//! `AppEvent`s to a terminal over an `mpsc` channel wrapped in a
//! `ReceiverStream`; this module generalises that transport-agnostic
//! shape to the spec's event table instead of terminal render events.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// One event in a run's stream. Per §4.K the sequence from a single run
/// is totally ordered and monotonic — a `StreamSink` only ever appends,
/// it never retracts a delivered `text-delta`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum StreamEvent {
    TextDelta { text: String },
    ToolCallStart { call_id: String, name: String, args: serde_json::Value },
    ToolCallEnd { call_id: String, result: serde_json::Value },
    Citation { anchor: String, document_id: Uuid },
    State { label: String },
    Done { message_id: Uuid },
    Error { code: String, message: String },
}

/// Bounded channel capacity for a run's event stream. Generous enough
/// that a burst of `text-delta`s from a fast model doesn't back-pressure
/// the run loop under normal client read rates.
const STREAM_CAPACITY: usize = 256;

/// Write half of a run's event stream, held by [`crate::agent::AgentRuntime`]
/// for the duration of one run.
#[derive(Clone)]
pub struct StreamSink(mpsc::Sender<StreamEvent>);

impl StreamSink {
    pub fn channel() -> (Self, ReceiverStream<StreamEvent>) {
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        (Self(tx), ReceiverStream::new(rx))
    }

    /// Sends an event, dropping it silently if the client has already
    /// disconnected — a run in progress must not fail just because
    /// nobody is listening anymore.
    pub async fn emit(&self, event: StreamEvent) {
        let _ = self.0.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn events_arrive_in_send_order() {
        let (sink, mut stream) = StreamSink::channel();
        sink.emit(StreamEvent::TextDelta { text: "a".into() }).await;
        sink.emit(StreamEvent::TextDelta { text: "b".into() }).await;
        drop(sink);

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert!(matches!(first, StreamEvent::TextDelta { text } if text == "a"));
        assert!(matches!(second, StreamEvent::TextDelta { text } if text == "b"));
        assert!(stream.next().await.is_none());
    }
}
