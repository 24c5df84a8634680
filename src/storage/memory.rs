use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::{ConversationStore, MessageStore, StoreError};
use crate::core::message::{ConversationId, ConversationSummary, Message, Role};

struct ConversationRow {
    title: String,
    updated_at: DateTime<Utc>,
    messages: Vec<Message>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    conversations: HashMap<ConversationId, ConversationRow>,
}

/// In-memory store backing the binary and the tests. Appending bumps the
/// conversation's `updated_at`, which is what keeps the sidebar's recency
/// ordering honest.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    revision: watch::Sender<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            revision: watch::channel(0).0,
        }
    }

    fn touch(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create(&self, title: &str) -> Result<ConversationId, StoreError> {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            inner.next_id += 1;
            let id = ConversationId(inner.next_id);
            inner.conversations.insert(
                id,
                ConversationRow {
                    title: title.to_string(),
                    updated_at: Utc::now(),
                    messages: Vec::new(),
                },
            );
            id
        };
        self.touch();
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut summaries: Vec<ConversationSummary> = inner
            .conversations
            .iter()
            .map(|(id, row)| ConversationSummary {
                id: *id,
                title: row.title.clone(),
                updated_at: row.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.0.cmp(&a.id.0)));
        Ok(summaries)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(
        &self,
        conversation_id: ConversationId,
        role: Role,
        content: &str,
    ) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock().unwrap();
            let row = inner
                .conversations
                .get_mut(&conversation_id)
                .ok_or_else(|| format!("unknown conversation: {conversation_id}"))?;
            row.messages.push(Message {
                role,
                content: content.to_string(),
            });
            row.updated_at = Utc::now();
        }
        self.touch();
        Ok(())
    }

    async fn list(&self, conversation_id: ConversationId) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let row = inner
            .conversations
            .get(&conversation_id)
            .ok_or_else(|| format!("unknown conversation: {conversation_id}"))?;
        Ok(row.messages.clone())
    }
}
