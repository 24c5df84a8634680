//! Persistence collaborators for conversations and messages.
//!
//! The session controller only depends on the two traits here; the binary
//! wires in [`MemoryStore`]. A backend-backed store plugs in the same way.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::core::message::{ConversationId, ConversationSummary, Message, Role};

pub mod memory;

pub use memory::MemoryStore;

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create(&self, title: &str) -> Result<ConversationId, StoreError>;

    /// Conversations ordered most-recently-updated first.
    async fn list(&self) -> Result<Vec<ConversationSummary>, StoreError>;

    /// Revision counter bumped on every store change; the sidebar refreshes
    /// when it observes a new value.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(
        &self,
        conversation_id: ConversationId,
        role: Role,
        content: &str,
    ) -> Result<(), StoreError>;

    /// Messages in creation order.
    async fn list(&self, conversation_id: ConversationId) -> Result<Vec<Message>, StoreError>;
}
