//! Scripted [`ChatModel`] for driving the reply loop in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::ChatModel;
use super::errors::InferenceError;
use super::types::{ChatMessage, ModelReply, ToolDefinition};

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(ModelReply),
    Fail,
}

/// Replays a fixed script. The last step repeats once the script runs out.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    transcripts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(replies: Vec<ModelReply>) -> Self {
        Self::new(replies.into_iter().map(Step::Reply).collect())
    }

    pub fn text(text: &str) -> Self {
        Self::replies(vec![ModelReply::Text(text.to_string())])
    }

    pub fn failing() -> Self {
        Self::new(vec![Step::Fail])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Transcript passed on each call, in call order.
    pub fn transcripts(&self) -> Vec<Vec<ChatMessage>> {
        self.transcripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelReply, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcripts.lock().unwrap().push(messages.to_vec());

        let step = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };

        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail) | None => Err(InferenceError::ConnectionFailed {
                endpoint: "scripted".into(),
                reason: "scripted failure".into(),
            }),
        }
    }
}
