use serde::{Deserialize, Serialize};

use crate::core::message::ConversationId;

#[derive(Serialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of the POST to the relay's `/chat` endpoint: the full ordered
/// message history plus the conversation it belongs to. The relay picks the
/// model and constructs the prompt; the client never sends either.
#[derive(Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "conversationId")]
    pub conversation_id: ConversationId,
}

// Response types deserialize leniently: every field defaults, so a
// metadata-only payload (no choices, no delta, no content) is a valid
// ChatResponse that simply yields no delta.

#[derive(Deserialize, Default)]
pub struct ChatResponseDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    #[serde(default)]
    pub delta: ChatResponseDelta,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}
