use ideasense_types::{ConversationMeta, CorrelationId, SendMessageResponse};

use super::message::{ChatMessage, CompletionOverride, MessageId};
use super::store::MessageStore;

/// Why a send was refused before anything was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    EmptyInput,
    NoProject,
    Closed,
}

/// Optimistic entry awaiting the server copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub local_id: MessageId,
    pub correlation_id: CorrelationId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Reconciled(Reconciliation),
    /// The service rejected the send; a system notice was appended instead.
    Failed,
    Rejected(SendRejection),
    /// The view was closed before the reply arrived.
    Discarded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SendState {
    #[default]
    Idle,
    Pending {
        correlation_id: CorrelationId,
    },
    Settled(SendOutcome),
}

impl SendState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// How the optimistic entry was located in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMatch {
    CorrelationId,
    Content,
    /// The server copy was already present; the optimistic entry was dropped.
    AlreadyPresent,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub matched: ReconcileMatch,
    pub ai_appended: bool,
    /// Stage signal carried by the reply, if it is worth emitting.
    pub meta: Option<ConversationMeta>,
}

/// Trims the draft; blank input is refused without error.
pub fn prepare_content(draft: &str) -> Result<String, SendRejection> {
    let content = draft.trim();
    if content.is_empty() {
        return Err(SendRejection::EmptyInput);
    }
    Ok(content.to_string())
}

/// Merges the server's reply into the buffer.
///
/// The optimistic entry is found by the echoed correlation id when the server
/// returns one, otherwise by the newest local user entry with the sent text.
/// Server entries are never matched, so reconciling twice cannot overwrite an
/// already settled message.
pub fn reconcile(
    store: &mut MessageStore,
    sent: &PendingSend,
    response: &SendMessageResponse,
) -> Reconciliation {
    let server_user = ChatMessage::from_conversation(&response.user_message, CompletionOverride::Any);

    let echoed = response
        .user_message
        .correlation_id()
        .filter(|echoed| *echoed == sent.correlation_id);
    let position = match echoed {
        Some(correlation_id) => store
            .rposition(|message| {
                message.is_pending() && message.correlation_id == Some(correlation_id)
            })
            .map(|index| (index, ReconcileMatch::CorrelationId)),
        None => None,
    }
    .or_else(|| {
        store
            .rposition(|message| message.is_pending() && message.text == sent.content)
            .map(|index| (index, ReconcileMatch::Content))
    });

    let matched = match position {
        Some((index, _)) if store.contains(server_user.id) => {
            store.remove(index);
            ReconcileMatch::AlreadyPresent
        }
        Some((index, matched)) => {
            let target = store.messages()[index].id;
            store.replace_last_matching(|message| message.id == target, server_user);
            matched
        }
        None => ReconcileMatch::NotFound,
    };

    let mut ai_appended = false;
    let mut meta = None;
    if let Some(ai_message) = response.ai_message.as_ref() {
        let summary_text = if ai_message.is_summary() {
            ai_message.summary_text.clone().filter(|text| !text.is_empty())
        } else {
            None
        };
        let is_complete = ai_message.is_completed();
        if summary_text.is_some() || is_complete {
            meta = Some(ConversationMeta {
                summary_text,
                is_complete: Some(is_complete),
            });
        }

        if !ai_message.is_summary() {
            let reply = ChatMessage::from_conversation(ai_message, CompletionOverride::Any);
            if !store.contains(reply.id) {
                store.append(vec![reply]);
                ai_appended = true;
            }
        }
    }

    Reconciliation {
        matched,
        ai_appended,
        meta,
    }
}

/// Appends the failure notice; the optimistic entry stays in place.
pub fn record_failure(store: &mut MessageStore, notice_id: MessageId) {
    store.append(vec![ChatMessage::send_failed(notice_id)]);
}
