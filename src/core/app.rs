//! Session controller: owns the transcript, drives one exchange at a time,
//! and reconciles stream deltas into the visible assistant message.
//!
//! The in-flight flag is the only mutual exclusion in the app: while it is
//! set, submits are no-ops and conversation switches are deferred. Every
//! terminal stream message releases it.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::ChatMessage;
use crate::core::chat_stream::{StreamMessage, StreamParams};
use crate::core::config::ResolvedConfig;
use crate::core::message::{ConversationId, ConversationSummary, Message, Role};
use crate::core::notice::{Notice, Notifier, Severity};
use crate::storage::{ConversationStore, MessageStore};

pub struct SessionContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
}

pub struct App {
    pub session: SessionContext,
    conversations: Arc<dyn ConversationStore>,
    message_store: Arc<dyn MessageStore>,
    notifier: Arc<dyn Notifier>,
    greeting: String,

    /// The visible transcript. The trailing assistant message is the only
    /// element that changes while a stream is in flight, and it changes by
    /// whole-value replacement.
    pub messages: VecDeque<Message>,
    pub input: String,
    pub conversation_id: Option<ConversationId>,
    pub is_streaming: bool,
    current_response: String,

    pub sidebar: Vec<ConversationSummary>,
    pub selected: usize,
    pub scroll_offset: u16,
    pub auto_scroll: bool,
}

impl App {
    pub fn new(
        config: &ResolvedConfig,
        conversations: Arc<dyn ConversationStore>,
        message_store: Arc<dyn MessageStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session: SessionContext {
                client: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
            },
            conversations,
            message_store,
            notifier,
            greeting: config.greeting.clone(),
            messages: VecDeque::new(),
            input: String::new(),
            conversation_id: None,
            is_streaming: false,
            current_response: String::new(),
            sidebar: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            auto_scroll: true,
        }
    }

    /// Creates a fresh conversation row and resets the transcript to the
    /// greeting. The greeting is display-only and never persisted.
    pub async fn start_new_conversation(&mut self) {
        if self.is_streaming {
            return;
        }
        match self.conversations.create("New Chat").await {
            Ok(id) => {
                self.conversation_id = Some(id);
                self.reset_transcript(Vec::new());
                self.refresh_sidebar().await;
                self.selected = 0;
            }
            Err(e) => {
                warn!("failed to create conversation: {e}");
                self.notify_failure();
            }
        }
    }

    pub async fn load_conversation(&mut self, id: ConversationId) {
        if self.is_streaming {
            debug!("ignoring conversation switch while a reply is streaming");
            return;
        }
        match self.message_store.list(id).await {
            Ok(stored) => {
                self.conversation_id = Some(id);
                self.reset_transcript(stored);
            }
            Err(e) => {
                warn!("failed to load conversation {id}: {e}");
                self.notify_failure();
            }
        }
    }

    pub async fn refresh_sidebar(&mut self) {
        match self.conversations.list().await {
            Ok(summaries) => {
                self.sidebar = summaries;
                if self.selected >= self.sidebar.len() {
                    self.selected = self.sidebar.len().saturating_sub(1);
                }
            }
            Err(e) => warn!("failed to list conversations: {e}"),
        }
    }

    fn reset_transcript(&mut self, stored: Vec<Message>) {
        self.messages.clear();
        if stored.is_empty() {
            self.messages
                .push_back(Message::assistant(self.greeting.clone()));
        } else {
            self.messages.extend(stored);
        }
        self.current_response.clear();
        self.scroll_offset = 0;
        self.auto_scroll = true;
    }

    /// Idle → Sending. Appends and persists the user message, stages the
    /// assistant placeholder, and hands back the request for the caller to
    /// spawn. `None` when a guard holds: blank input, a stream already in
    /// flight, or no conversation selected.
    pub async fn submit(&mut self) -> Option<StreamParams> {
        if self.input.trim().is_empty() || self.is_streaming {
            return None;
        }
        let conversation_id = self.conversation_id?;

        let content = std::mem::take(&mut self.input);
        self.messages.push_back(Message::user(content.clone()));

        if let Err(e) = self
            .message_store
            .append(conversation_id, Role::User, &content)
            .await
        {
            warn!("failed to persist user message: {e}");
        }

        let api_messages = self.build_api_messages();
        self.messages.push_back(Message::assistant(String::new()));
        self.current_response.clear();
        self.is_streaming = true;
        self.auto_scroll = true;

        Some(StreamParams {
            client: self.session.client.clone(),
            base_url: self.session.base_url.clone(),
            api_key: self.session.api_key.clone(),
            api_messages,
            conversation_id,
        })
    }

    /// Streaming → {Streaming, Finalizing, Errored} → Idle. Messages that
    /// arrive with no stream in flight are stale and ignored.
    pub async fn apply_stream_message(&mut self, message: StreamMessage) {
        if !self.is_streaming {
            debug!("ignoring stream message outside an active stream");
            return;
        }

        match message {
            StreamMessage::Chunk(delta) => self.append_delta(&delta),
            StreamMessage::Done => self.finalize_stream().await,
            StreamMessage::RateLimited => {
                self.abort_stream();
                self.notifier.notify(Notice::new(
                    "Rate limit exceeded",
                    "Too many requests. Please try again later.",
                    Severity::Warning,
                ));
            }
            StreamMessage::PaymentRequired => {
                self.abort_stream();
                self.notifier.notify(Notice::new(
                    "Payment required",
                    "Please add credits to your workspace.",
                    Severity::Error,
                ));
            }
            StreamMessage::Failed => {
                self.abort_stream();
                self.notify_failure();
            }
        }
    }

    /// Appends one delta and replaces the trailing assistant message with a
    /// fresh snapshot of the running total. Observers never see a partially
    /// mutated message.
    fn append_delta(&mut self, delta: &str) {
        self.current_response.push_str(delta);
        if let Some(last) = self.messages.back_mut() {
            if last.role.is_assistant() {
                *last = Message::assistant(self.current_response.clone());
            }
        }
    }

    async fn finalize_stream(&mut self) {
        self.is_streaming = false;
        if self.current_response.is_empty() {
            // Nothing arrived before the stream closed; drop the placeholder.
            self.rollback_assistant();
            return;
        }
        if let Some(conversation_id) = self.conversation_id {
            if let Err(e) = self
                .message_store
                .append(conversation_id, Role::Assistant, &self.current_response)
                .await
            {
                warn!("failed to persist assistant message: {e}");
            }
        }
        self.refresh_sidebar().await;
    }

    fn abort_stream(&mut self) {
        self.is_streaming = false;
        self.rollback_assistant();
    }

    /// Retracts the optimistically staged assistant message, whether still
    /// empty or partially filled.
    fn rollback_assistant(&mut self) {
        if self
            .messages
            .back()
            .is_some_and(|message| message.role.is_assistant())
        {
            self.messages.pop_back();
        }
        self.current_response.clear();
    }

    fn notify_failure(&self) {
        self.notifier.notify(Notice::new(
            "Error",
            "Failed to send message. Please try again.",
            Severity::Error,
        ));
    }

    fn build_api_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|message| ChatMessage {
                role: message.role.as_str().to_string(),
                content: message.content.clone(),
            })
            .collect()
    }

    pub fn select_previous_conversation(&mut self) -> Option<ConversationId> {
        if self.sidebar.is_empty() {
            return None;
        }
        self.selected = self.selected.saturating_sub(1);
        Some(self.sidebar[self.selected].id)
    }

    pub fn select_next_conversation(&mut self) -> Option<ConversationId> {
        if self.sidebar.is_empty() {
            return None;
        }
        self.selected = (self.selected + 1).min(self.sidebar.len() - 1);
        Some(self.sidebar[self.selected].id)
    }
}
