use chrono::{SecondsFormat, Utc};
use ideasense_types::{ConversationMessage, CorrelationId, MessageRole};

/// Shown in place of an AI reply that closes a stage without carrying the summary.
pub const STAGE_COMPLETE_MESSAGE: &str = "This stage is over, please generate summary.";
/// Synthetic system entry appended when a send is rejected.
pub const SEND_FAILED_MESSAGE: &str = "Failed to send message.";

/// Per-view sequence number for entries that have no server id yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalMessageId(pub u64);

/// Identifier of one displayed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    Server(i64),
    Local(LocalMessageId),
}

impl MessageId {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// Monotonic allocator for local ids; never reuses a value within one view.
#[derive(Debug, Default)]
pub struct LocalIdAllocator {
    next: u64,
}

impl LocalIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> MessageId {
        self.next = self.next.saturating_add(1);
        MessageId::Local(LocalMessageId(self.next))
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Ai,
    System,
}

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => Self::User,
            MessageRole::Ai => Self::Ai,
            MessageRole::System => Self::System,
        }
    }
}

/// Which server records may swap their text for the stage-complete notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOverride {
    /// Any completed non-summary AI record (live send replies).
    Any,
    /// Only the record with this id (history pages).
    Only(Option<i64>),
}

impl CompletionOverride {
    fn permits(&self, id: i64) -> bool {
        match self {
            Self::Any => true,
            Self::Only(allowed) => *allowed == Some(id),
        }
    }
}

/// One displayed entry of the chat buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub created_at: String,
    /// Present on optimistic user entries until the server copy replaces them.
    pub correlation_id: Option<CorrelationId>,
}

impl ChatMessage {
    pub fn new(
        id: MessageId,
        role: Role,
        text: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            created_at: created_at.into(),
            correlation_id: None,
        }
    }

    /// Creates the optimistic entry for a message that is still in flight.
    pub fn local_user(id: MessageId, correlation_id: CorrelationId, text: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            ..Self::new(id, Role::User, text, now_iso8601())
        }
    }

    pub fn send_failed(id: MessageId) -> Self {
        Self::new(id, Role::System, SEND_FAILED_MESSAGE, now_iso8601())
    }

    /// Converts a server record for display. The stage-complete override only
    /// touches the rendered text, the record itself is left as the server sent it.
    pub fn from_conversation(message: &ConversationMessage, rule: CompletionOverride) -> Self {
        let role = Role::from(message.role);
        let shows_completion = role == Role::Ai
            && message.is_completed()
            && !message.is_summary()
            && rule.permits(message.id);
        let text = if shows_completion {
            STAGE_COMPLETE_MESSAGE.to_string()
        } else {
            message.content.clone()
        };

        Self::new(MessageId::Server(message.id), role, text, message.created_at.clone())
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_local() && self.role == Role::User
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
