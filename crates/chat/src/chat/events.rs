use std::sync::Arc;

use ideasense_types::{ConversationMeta, Stage, StageMeta};
use tokio::sync::mpsc;

/// Receiver of stage signals, implemented by the owning workspace.
pub trait MetaSink: Send + Sync {
    fn on_conversation_meta(&self, meta: StageMeta);
}

impl<F> MetaSink for F
where
    F: Fn(StageMeta) + Send + Sync,
{
    fn on_conversation_meta(&self, meta: StageMeta) {
        self(meta)
    }
}

/// Sink that forwards every notification into an unbounded channel.
pub fn channel_sink() -> (Arc<dyn MetaSink>, mpsc::UnboundedReceiver<StageMeta>) {
    let (meta_tx, meta_rx) = mpsc::unbounded_channel();
    let sink = move |meta: StageMeta| {
        // A dropped receiver means the workspace went away; nothing left to notify.
        let _ = meta_tx.send(meta);
    };
    (Arc::new(sink), meta_rx)
}

/// Sink for views whose host does not track stage signals.
pub fn discard_sink() -> Arc<dyn MetaSink> {
    Arc::new(|_meta: StageMeta| {})
}

/// Notifies the workspace of stage signals for one chat view.
///
/// Never emits a bare stage notification: at least one of summary text or
/// completion has to be present.
#[derive(Clone)]
pub struct StageMetaEmitter {
    stage: Stage,
    sink: Arc<dyn MetaSink>,
}

impl StageMetaEmitter {
    pub fn new(stage: Stage, sink: Arc<dyn MetaSink>) -> Self {
        Self { stage, sink }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns whether a notification was delivered.
    pub fn emit(&self, meta: ConversationMeta) -> bool {
        let meta = ConversationMeta {
            summary_text: meta.summary_text.filter(|text| !text.is_empty()),
            is_complete: meta.is_complete,
        };
        if meta.is_empty() {
            return false;
        }

        tracing::debug!(
            stage = %self.stage,
            has_summary = meta.summary_text.is_some(),
            is_complete = ?meta.is_complete,
            "emitting conversation meta"
        );
        self.sink
            .on_conversation_meta(StageMeta::new(self.stage, meta));
        true
    }
}

impl std::fmt::Debug for StageMetaEmitter {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StageMetaEmitter")
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}
