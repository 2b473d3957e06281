use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::flag::{coerce_flag, coerce_optional_flag};
use super::ids::CorrelationId;
use super::stage::Stage;

/// Speaker role as reported by the conversation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
    System,
}

/// One message record as stored by the conversation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: i64,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_summary: Option<bool>,
    // `null` and an absent field both land in `None`, i.e. "not defined".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl ConversationMessage {
    pub fn is_summary(&self) -> bool {
        self.is_summary.unwrap_or(false)
    }

    pub fn has_completion_flag(&self) -> bool {
        self.is_completed.is_some()
    }

    pub fn completion_flag(&self) -> Option<bool> {
        self.is_completed.as_ref().map(coerce_flag)
    }

    pub fn is_completed(&self) -> bool {
        coerce_optional_flag(self.is_completed.as_ref())
    }

    /// Correlation id echoed by servers that round-trip `client_id`.
    /// Anything unparseable is treated as not echoed.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.client_id
            .as_deref()
            .and_then(|raw| CorrelationId::parse(raw).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub stage: Stage,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<CorrelationId>,
}

impl SendMessageRequest {
    pub fn new(stage: Stage, content: impl Into<String>) -> Self {
        Self {
            stage,
            content: content.into(),
            search_enabled: None,
            client_id: None,
        }
    }

    pub fn with_search_enabled(mut self, search_enabled: bool) -> Self {
        self.search_enabled = Some(search_enabled);
        self
    }

    pub fn with_client_id(mut self, client_id: CorrelationId) -> Self {
        self.client_id = Some(client_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub user_message: ConversationMessage,
    #[serde(default)]
    pub ai_message: Option<ConversationMessage>,
}

/// Conversation-wide stage signals derived from the message history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationMeta {
    pub summary_text: Option<String>,
    pub is_complete: Option<bool>,
}

impl ConversationMeta {
    /// Scans the whole history: the latest summary record supplies the summary
    /// text and the latest record with a defined completion flag supplies
    /// completion, regardless of which page is being displayed.
    pub fn scan(messages: &[ConversationMessage]) -> Self {
        let summary_text = messages
            .iter()
            .rev()
            .find(|message| message.is_summary())
            .and_then(|message| message.summary_text.clone());
        let is_complete = messages
            .iter()
            .rev()
            .find_map(ConversationMessage::completion_flag);

        Self {
            summary_text,
            is_complete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summary_text.as_deref().is_none_or(str::is_empty) && self.is_complete.is_none()
    }
}

/// Stage-scoped notification delivered to the workspace host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageMeta {
    pub stage: Stage,
    pub summary_text: Option<String>,
    pub is_complete: Option<bool>,
}

impl StageMeta {
    pub fn new(stage: Stage, meta: ConversationMeta) -> Self {
        Self {
            stage,
            summary_text: meta.summary_text,
            is_complete: meta.is_complete,
        }
    }

    /// Hosts drop notifications produced for a stage they no longer display.
    pub fn applies_to(&self, viewed_stage: Stage) -> bool {
        self.stage == viewed_stage
    }
}
