// Server-sent event stream of plugin messages
use crate::application::pidtune_service::PluginMessage;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};

fn to_event(message: &PluginMessage) -> Option<Event> {
    match Event::default().json_data(message) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!("Plugin message serialization error: {}", e);
            None
        }
    }
}

/// Stream messages until the sender goes away. Slow readers skip what they missed.
pub fn message_stream(
    mut rx: broadcast::Receiver<PluginMessage>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if let Some(event) = to_event(&message) {
                        yield Ok(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event subscriber lagged, {} messages skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

/// Helper to create an SSE response from a receiver
pub fn sse_from_receiver(rx: broadcast::Receiver<PluginMessage>) -> impl IntoResponse {
    Sse::new(message_stream(rx)).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_ends_when_sender_dropped() {
        let (tx, rx) = broadcast::channel(4);
        tx.send(PluginMessage::Locked(serde_json::json!({}))).unwrap();
        drop(tx);

        let events: Vec<_> = message_stream(rx).collect().await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_reading() {
        let (tx, rx) = broadcast::channel(1);
        tx.send(PluginMessage::Locked(serde_json::json!({}))).unwrap();
        tx.send(PluginMessage::Locked(serde_json::json!({"n": 2}))).unwrap();
        drop(tx);

        let events: Vec<_> = message_stream(rx).collect().await;
        assert_eq!(events.len(), 1);
    }
}
