use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use ideasense_client::{BoxFuture, ConversationService, ServiceError, ServiceResult};
use ideasense_types::{
    ConversationMessage, MessageRole, SendMessageRequest, SendMessageResponse, Stage,
};
use tokio::sync::oneshot;

pub(crate) fn record(id: i64, role: MessageRole, content: &str) -> ConversationMessage {
    ConversationMessage {
        id,
        role,
        content: content.to_string(),
        created_at: format!(
            "2024-05-01T{:02}:{:02}:{:02}Z",
            id / 3600,
            (id / 60) % 60,
            id % 60
        ),
        summary_text: None,
        verification: None,
        is_summary: None,
        is_completed: None,
        client_id: None,
    }
}

pub(crate) fn history(total: i64) -> Vec<ConversationMessage> {
    (1..=total)
        .map(|id| {
            let role = if id % 2 == 1 {
                MessageRole::User
            } else {
                MessageRole::Ai
            };
            record(id, role, &format!("message {id}"))
        })
        .collect()
}

/// In-memory conversation service with scriptable failures and held fetches.
#[derive(Default)]
pub(crate) struct ScriptedService {
    history: Mutex<Vec<ConversationMessage>>,
    fail_lists: AtomicBool,
    fail_sends: AtomicBool,
    echo_client_id: AtomicBool,
    list_gates: Mutex<Vec<oneshot::Receiver<()>>>,
    list_calls: AtomicUsize,
    sent: Mutex<Vec<(String, SendMessageRequest)>>,
    next_id: AtomicI64,
    ai_reply: Mutex<Option<ConversationMessage>>,
}

impl ScriptedService {
    pub(crate) fn with_history(messages: Vec<ConversationMessage>) -> Self {
        let next_id = messages.iter().map(|message| message.id).max().unwrap_or(0) + 1;
        Self {
            history: Mutex::new(messages),
            next_id: AtomicI64::new(next_id),
            ..Self::default()
        }
    }

    pub(crate) fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn echo_client_id(&self, echo: bool) {
        self.echo_client_id.store(echo, Ordering::SeqCst);
    }

    pub(crate) fn reply_with(&self, message: ConversationMessage) {
        *self.ai_reply.lock().unwrap() = Some(message);
    }

    /// The next list call blocks until the returned sender fires or is dropped.
    pub(crate) fn hold_next_list(&self) -> oneshot::Sender<()> {
        let (release_tx, release_rx) = oneshot::channel();
        self.list_gates.lock().unwrap().push(release_rx);
        release_tx
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> Vec<(String, SendMessageRequest)> {
        self.sent.lock().unwrap().clone()
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl ConversationService for ScriptedService {
    fn list_messages<'a>(
        &'a self,
        _project_id: &'a str,
        _stage: Stage,
    ) -> BoxFuture<'a, ServiceResult<Vec<ConversationMessage>>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = {
            let mut gates = self.list_gates.lock().unwrap();
            (!gates.is_empty()).then(|| gates.remove(0))
        };
        let fail = self.fail_lists.load(Ordering::SeqCst);
        let messages = self.history.lock().unwrap().clone();

        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if fail {
                return Err(ServiceError::Unavailable {
                    stage: "scripted-list-messages",
                    details: "history unavailable".to_string(),
                });
            }
            Ok(messages)
        })
    }

    fn send_message<'a>(
        &'a self,
        project_id: &'a str,
        request: SendMessageRequest,
    ) -> BoxFuture<'a, ServiceResult<SendMessageResponse>> {
        self.sent
            .lock()
            .unwrap()
            .push((project_id.to_string(), request.clone()));

        let result = if self.fail_sends.load(Ordering::SeqCst) {
            Err(ServiceError::Unavailable {
                stage: "scripted-send-message",
                details: "send rejected".to_string(),
            })
        } else {
            let mut user_message = record(self.allocate_id(), MessageRole::User, &request.content);
            if self.echo_client_id.load(Ordering::SeqCst) {
                user_message.client_id = request.client_id.map(|id| id.to_string());
            }
            let ai_message = self.ai_reply.lock().unwrap().take().unwrap_or_else(|| {
                record(
                    self.allocate_id(),
                    MessageRole::Ai,
                    &format!("Noted: {}", request.content),
                )
            });

            let mut history = self.history.lock().unwrap();
            history.push(user_message.clone());
            history.push(ai_message.clone());
            Ok(SendMessageResponse {
                user_message,
                ai_message: Some(ai_message),
            })
        };

        Box::pin(async move { result })
    }
}
