//! Spawns and drives one streaming exchange with the relay.
//!
//! The dispatcher runs the HTTP request on a background task and reports
//! back over an unbounded channel. At most one stream is in flight at a
//! time (the app's in-flight flag enforces this), so messages carry no
//! stream identity and there is no cancellation path: a stream ends at the
//! `[DONE]` sentinel, at connection close, or at an I/O failure.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest};
use crate::core::message::ConversationId;
use crate::core::sse::{SseDecoder, SseEvent};
use crate::utils::url::construct_api_url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    /// One delta fragment of the assistant's reply.
    Chunk(String),
    /// 429 from the relay; body not consumed.
    RateLimited,
    /// 402 from the relay; body not consumed.
    PaymentRequired,
    /// Request failure, unrecognized status, or mid-stream read error.
    /// Detail goes to the log, never to the user.
    Failed,
    /// Stream finished, via the sentinel or connection close.
    Done,
}

impl StreamMessage {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamMessage::Chunk(_))
    }
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub api_messages: Vec<ChatMessage>,
    pub conversation_id: ConversationId,
}

#[derive(Clone)]
pub struct StreamDispatcher {
    tx: mpsc::UnboundedSender<StreamMessage>,
}

impl StreamDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Runs the exchange on a background task. Sends zero or more `Chunk`s
    /// followed by exactly one terminal message.
    pub fn spawn(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = run_stream(params, &tx).await;
            let _ = tx.send(outcome);
        });
    }
}

async fn run_stream(
    params: StreamParams,
    tx: &mpsc::UnboundedSender<StreamMessage>,
) -> StreamMessage {
    let StreamParams {
        client,
        base_url,
        api_key,
        api_messages,
        conversation_id,
    } = params;

    let request = ChatRequest {
        messages: api_messages,
        conversation_id,
    };

    let chat_url = construct_api_url(&base_url, "chat");
    let mut http_request = client.post(chat_url).header("Content-Type", "application/json");
    if !api_key.is_empty() {
        http_request = http_request.header("Authorization", format!("Bearer {api_key}"));
    }

    let response = match http_request.json(&request).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("chat request failed: {e}");
            return StreamMessage::Failed;
        }
    };

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return StreamMessage::RateLimited;
    }
    if status == reqwest::StatusCode::PAYMENT_REQUIRED {
        return StreamMessage::PaymentRequired;
    }
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        warn!(%status, %body, "relay returned error status");
        return StreamMessage::Failed;
    }

    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("stream read failed: {e}");
                return StreamMessage::Failed;
            }
        };

        for event in decoder.feed(&chunk) {
            match event {
                SseEvent::Delta(text) => {
                    let _ = tx.send(StreamMessage::Chunk(text));
                }
                SseEvent::Done => return StreamMessage::Done,
            }
        }
    }

    // Connection closed without the sentinel; whatever fragment the decoder
    // still holds is dropped with it.
    debug!("stream ended without sentinel");
    StreamMessage::Done
}

#[cfg(test)]
impl StreamDispatcher {
    pub fn send_for_test(&self, message: StreamMessage) {
        let _ = self.tx.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_is_the_only_non_terminal_message() {
        assert!(!StreamMessage::Chunk("x".into()).is_terminal());
        assert!(StreamMessage::RateLimited.is_terminal());
        assert!(StreamMessage::PaymentRequired.is_terminal());
        assert!(StreamMessage::Failed.is_terminal());
        assert!(StreamMessage::Done.is_terminal());
    }
}
