use std::collections::HashMap;
use std::sync::Arc;

use ideasense_client::ConversationService;

use super::events::{MetaSink, StageMetaEmitter};
use super::view::{ChatView, ViewKey};
use crate::settings::PreferenceStore;

/// Owns every live chat view, one per (project, stage) key.
pub struct ChatViewRegistry {
    service: Arc<dyn ConversationService>,
    sink: Arc<dyn MetaSink>,
    preferences: Arc<PreferenceStore>,
    views: HashMap<ViewKey, ChatView>,
    active: Option<ViewKey>,
}

impl ChatViewRegistry {
    pub fn new(
        service: Arc<dyn ConversationService>,
        sink: Arc<dyn MetaSink>,
        preferences: Arc<PreferenceStore>,
    ) -> Self {
        Self {
            service,
            sink,
            preferences,
            views: HashMap::new(),
            active: None,
        }
    }

    /// Returns the view for `key`, creating it on first use.
    pub fn open(&mut self, key: ViewKey) -> ChatView {
        if let Some(view) = self.views.get(&key) {
            return view.clone();
        }
        let view = self.create(key.clone());
        self.views.insert(key, view.clone());
        view
    }

    /// Makes `key` the displayed conversation. Switching closes the previous
    /// view and starts a fresh one, so late results for the old key are dropped.
    pub async fn activate(&mut self, key: ViewKey) -> ChatView {
        if self.active.as_ref() == Some(&key) {
            if let Some(view) = self.views.get(&key) {
                return view.clone();
            }
        }

        if let Some(previous) = self.active.take() {
            self.close(&previous).await;
        }
        self.close(&key).await;

        tracing::debug!(
            project_id = ?key.project_id,
            stage = %key.stage,
            "activating chat view"
        );
        let view = self.create(key.clone());
        self.views.insert(key.clone(), view.clone());
        self.active = Some(key);
        view
    }

    pub fn get(&self, key: &ViewKey) -> Option<&ChatView> {
        self.views.get(key)
    }

    pub fn active(&self) -> Option<&ChatView> {
        self.active.as_ref().and_then(|key| self.views.get(key))
    }

    /// Returns whether a view was registered under `key`.
    pub async fn close(&mut self, key: &ViewKey) -> bool {
        if self.active.as_ref() == Some(key) {
            self.active = None;
        }
        match self.views.remove(key) {
            Some(view) => {
                view.close().await;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    fn create(&self, key: ViewKey) -> ChatView {
        let emitter = StageMetaEmitter::new(key.stage, self.sink.clone());
        ChatView::new(
            key,
            self.service.clone(),
            emitter,
            self.preferences.clone(),
        )
    }
}
