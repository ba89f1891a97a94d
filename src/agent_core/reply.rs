//! ReplyEngine — bounded tool-using reply loop.
//!
//! Flow for one user turn:
//! 1. Load the recent history window and build the transcript
//! 2. Call the model with the sandbox tool definitions
//! 3. Text reply → done; tool calls → run them, append results, call again
//! 4. After `max_steps` model calls without a text reply, return a fixed
//!    fallback message
//!
//! Tool failures are fed back to the model as text and never end the loop.
//! A model failure ends the reply immediately.

use std::sync::Arc;

use crate::config::AgentSettings;
use crate::inference::types::{ChatMessage, ModelReply, ToolCall};
use crate::inference::ChatModel;
use crate::sandbox::SandboxStore;

use super::conversation::{build_transcript, ConversationStore};
use super::errors::AgentError;
use super::tools::{ToolRegistry, UserScope};
use super::types::Conversation;

/// Fixed system instruction placed first in every transcript.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. When useful, use available tools \
to inspect or edit files before answering. If the user asks about files (list/read/write), \
you MUST call the relevant fs_* tool. Do not guess.";

/// Returned when the step budget runs out while the model still wants tools.
pub const EXHAUSTED_REPLY: &str = "I couldn't finish tool use in time. Please try again.";

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done(String),
    Exhausted,
}

/// Produces assistant replies for conversations.
pub struct ReplyEngine<M> {
    model: M,
    store: Arc<ConversationStore>,
    sandbox: Arc<SandboxStore>,
    settings: AgentSettings,
}

impl<M: ChatModel> ReplyEngine<M> {
    pub fn new(
        model: M,
        store: Arc<ConversationStore>,
        sandbox: Arc<SandboxStore>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            model,
            store,
            sandbox,
            settings,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Generate the assistant reply for the latest turn of `conversation`.
    ///
    /// `user_text` must already be stored; the transcript is rebuilt from the
    /// database. The reply itself is not stored here.
    pub async fn generate_reply(
        &self,
        user_text: &str,
        conversation: &Conversation,
    ) -> Result<String, AgentError> {
        let history = self
            .store
            .recent_history(conversation.id, self.settings.history_window)?;
        let mut messages = build_transcript(SYSTEM_PROMPT, &history);

        let registry = ToolRegistry::for_user(UserScope {
            user_id: conversation.owner_id,
            sandbox: Arc::clone(&self.sandbox),
        });
        let tools = registry.definitions();

        tracing::info!(
            conversation_id = conversation.id,
            history_len = history.len(),
            user_text_len = user_text.len(),
            "generating reply"
        );

        let mut steps = 0;
        let mut state = LoopState::AwaitingModel;
        loop {
            state = match state {
                LoopState::AwaitingModel if steps >= self.settings.max_steps => {
                    LoopState::Exhausted
                }
                LoopState::AwaitingModel => {
                    steps += 1;
                    tracing::info!(step = steps, message_count = messages.len(), "model round");
                    match self.model.complete(&messages, &tools).await? {
                        ModelReply::Text(text) => LoopState::Done(text),
                        ModelReply::ToolCalls(calls) => LoopState::ExecutingTools(calls),
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    tracing::info!(
                        conversation_id = conversation.id,
                        step = steps,
                        tool_calls = calls.len(),
                        "executing tool calls"
                    );
                    messages.push(ChatMessage::assistant_tool_calls(&calls));
                    for call in &calls {
                        let output = registry.invoke(call).into_text();
                        messages.push(ChatMessage::tool_result(&call.id, &output));
                    }
                    LoopState::AwaitingModel
                }
                LoopState::Done(text) => {
                    tracing::info!(conversation_id = conversation.id, steps, "reply done");
                    return Ok(text);
                }
                LoopState::Exhausted => {
                    tracing::warn!(
                        conversation_id = conversation.id,
                        max_steps = self.settings.max_steps,
                        "step budget exhausted"
                    );
                    return Ok(EXHAUSTED_REPLY.to_string());
                }
            };
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
