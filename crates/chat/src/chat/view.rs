use std::sync::Arc;

use futures::StreamExt;
use ideasense_client::{ConversationService, fetch_messages_page};
use ideasense_types::{CorrelationId, SendMessageRequest, Stage};
use tokio::sync::Mutex;

use super::events::StageMetaEmitter;
use super::message::{ChatMessage, CompletionOverride, LocalIdAllocator};
use super::notice::{LoadAffordance, StageNotice, stage_notice};
use super::pagination::{
    LoadGeneration, LoadOutcome, LoadSkip, LoadTarget, LoadingFlag, LoadingGuard, PAGE_SIZE,
    PaginationState,
};
use super::scroll_manager::{
    ScrollCommand, ScrollEvents, ScrollHost, ScrollManager, ScrollMetrics, ScrollSubscription,
    subscribe_channel,
};
use super::send::{
    PendingSend, SendOutcome, SendRejection, SendState, prepare_content, reconcile, record_failure,
};
use super::store::{LoadMode, MessageStore};
use crate::settings::PreferenceStore;

/// Identity of one chat view. A new key always means a new view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub project_id: Option<String>,
    pub stage: Stage,
}

impl ViewKey {
    pub fn new(project_id: Option<&str>, stage: Stage) -> Self {
        Self {
            project_id: project_id.map(str::to_string),
            stage,
        }
    }
}

#[derive(Debug)]
struct ViewState {
    store: MessageStore,
    pagination: PaginationState,
    scroll: ScrollManager,
    send: SendState,
    local_ids: LocalIdAllocator,
    draft: String,
    closed: bool,
}

impl ViewState {
    fn new() -> Self {
        Self {
            store: MessageStore::new(),
            pagination: PaginationState::new(),
            scroll: ScrollManager::new(),
            send: SendState::Idle,
            local_ids: LocalIdAllocator::new(),
            draft: String::new(),
            closed: false,
        }
    }
}

/// Everything a host needs to render one frame of the view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub key: ViewKey,
    pub messages: Vec<ChatMessage>,
    pub page: usize,
    pub has_more: bool,
    pub booting: bool,
    pub loading: bool,
    pub load_affordance: LoadAffordance,
    pub notice: Option<StageNotice>,
    pub show_scroll_to_bottom: bool,
    pub draft: String,
    pub search_enabled: bool,
    pub send_state: SendState,
    pub closed: bool,
}

/// Headless chat engine for one (project, stage) conversation.
///
/// Cloning yields another handle to the same view. State is only locked
/// between awaits, so loads, sends and scroll events can interleave freely.
#[derive(Clone)]
pub struct ChatView {
    key: ViewKey,
    service: Arc<dyn ConversationService>,
    emitter: StageMetaEmitter,
    preferences: Arc<PreferenceStore>,
    state: Arc<Mutex<ViewState>>,
    loading: LoadingFlag,
    page_size: usize,
}

impl ChatView {
    pub fn new(
        key: ViewKey,
        service: Arc<dyn ConversationService>,
        emitter: StageMetaEmitter,
        preferences: Arc<PreferenceStore>,
    ) -> Self {
        Self {
            key,
            service,
            emitter,
            preferences,
            state: Arc::new(Mutex::new(ViewState::new())),
            loading: LoadingFlag::new(),
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn key(&self) -> &ViewKey {
        &self.key
    }

    pub fn stage(&self) -> Stage {
        self.key.stage
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    /// Loads the newest page, replacing whatever the buffer holds.
    pub async fn boot(&self) -> LoadOutcome {
        let Some(project_id) = self.key.project_id.as_deref() else {
            let mut state = self.state.lock().await;
            state.store.clear();
            state.pagination.clear();
            state.scroll.reset();
            return LoadOutcome::Skipped(LoadSkip::NoProject);
        };
        let Some(guard) = self.loading.try_acquire() else {
            return LoadOutcome::Skipped(LoadSkip::InFlight);
        };

        let target = {
            let mut state = self.state.lock().await;
            if state.closed {
                return LoadOutcome::Skipped(LoadSkip::Closed);
            }
            state.store.clear();
            state.scroll.reset();
            state.pagination.begin_reset()
        };

        self.load_page(project_id, target, guard).await
    }

    /// Loads the next older page above the current buffer. Triggered by the
    /// top-of-list scroll threshold and by the "load previous" control.
    /// After a failed first load the trigger retries that load instead.
    pub async fn load_previous(&self) -> LoadOutcome {
        let Some(project_id) = self.key.project_id.as_deref() else {
            return LoadOutcome::Skipped(LoadSkip::NoProject);
        };
        if self.state.lock().await.pagination.awaits_first_page() {
            tracing::debug!(
                project_id,
                stage = %self.key.stage,
                "retrying the first page"
            );
            return self.boot().await;
        }
        let Some(guard) = self.loading.try_acquire() else {
            return LoadOutcome::Skipped(LoadSkip::InFlight);
        };

        let target = {
            let mut state = self.state.lock().await;
            if state.closed {
                return LoadOutcome::Skipped(LoadSkip::Closed);
            }
            match state.pagination.begin_prepend() {
                Ok(target) => target,
                Err(skip) => return LoadOutcome::Skipped(skip),
            }
        };

        self.load_page(project_id, target, guard).await
    }

    async fn load_page(
        &self,
        project_id: &str,
        target: LoadTarget,
        _guard: LoadingGuard,
    ) -> LoadOutcome {
        let result = fetch_messages_page(
            self.service.as_ref(),
            project_id,
            self.key.stage,
            target.page,
            self.page_size,
        )
        .await;

        let (outcome, meta) = {
            let mut state = self.state.lock().await;
            if state.closed || !state.pagination.accepts(target) {
                tracing::debug!(
                    project_id,
                    stage = %self.key.stage,
                    page = target.page,
                    "discarding stale page"
                );
                return LoadOutcome::Discarded;
            }

            match result {
                Ok(page) => {
                    let rule = CompletionOverride::Only(page.latest_completed_id);
                    let items: Vec<ChatMessage> = page
                        .items
                        .iter()
                        .map(|message| ChatMessage::from_conversation(message, rule))
                        .collect();
                    let item_count = items.len();

                    state.scroll.note_mutation(target.mode);
                    state.store.apply(target.mode, items);
                    state.pagination.complete(target, page.has_more);
                    tracing::info!(
                        project_id,
                        stage = %self.key.stage,
                        page = target.page,
                        item_count,
                        has_more = page.has_more,
                        "loaded conversation page"
                    );

                    let outcome = LoadOutcome::Loaded {
                        mode: target.mode,
                        page: target.page,
                        item_count,
                        has_more: page.has_more,
                    };
                    (outcome, Some(page.meta))
                }
                Err(error) => {
                    state.pagination.fail(target);
                    tracing::warn!(
                        project_id,
                        stage = %self.key.stage,
                        page = target.page,
                        "failed to load conversation page: {}",
                        error
                    );
                    (LoadOutcome::Failed, None)
                }
            }
        };

        if let Some(meta) = meta {
            self.emitter.emit(meta);
        }
        outcome
    }

    /// Feeds one scroll event. Reaching the top loads the previous page when
    /// one exists and nothing else is loading. Events that arrive before a
    /// reset has been rendered never trigger a load.
    pub async fn handle_scroll(&self, metrics: ScrollMetrics) -> Option<LoadOutcome> {
        let wants_older = {
            let mut state = self.state.lock().await;
            let observation = state.scroll.observe(metrics);
            observation.near_top
                && !state.closed
                && !state.pagination.is_booting()
                && !state.scroll.awaits_reset_render()
                && state.pagination.has_more()
        };

        if wants_older && !self.loading.is_loading() {
            Some(self.load_previous().await)
        } else {
            None
        }
    }

    /// Called by the host once the latest buffer is laid out.
    pub async fn after_render(&self, metrics: ScrollMetrics) -> Option<ScrollCommand> {
        self.state.lock().await.scroll.after_render(metrics)
    }

    pub async fn scroll_to_bottom_clicked(&self) -> ScrollCommand {
        self.state.lock().await.scroll.scroll_to_bottom_clicked()
    }

    /// Subscribes to the host's scroll container and processes its current
    /// position once. Feed the returned events to [`ChatView::run_scroll_events`].
    pub async fn attach(&self, host: Arc<dyn ScrollHost>) -> (ScrollSubscription, ScrollEvents) {
        let initial = host.metrics();
        let attachment = subscribe_channel(host);
        self.handle_scroll(initial).await;
        attachment
    }

    /// Drains scroll events until the subscription is released.
    pub async fn run_scroll_events(&self, mut events: ScrollEvents) {
        while let Some(metrics) = events.next().await {
            if self.state.lock().await.closed {
                break;
            }
            self.handle_scroll(metrics).await;
        }
    }

    pub async fn set_draft(&self, draft: impl Into<String>) {
        self.state.lock().await.draft = draft.into();
    }

    /// Sends the current draft. Blank drafts are left untouched.
    pub async fn send(&self) -> SendOutcome {
        if self.key.project_id.is_none() {
            return SendOutcome::Rejected(SendRejection::NoProject);
        }
        let draft = {
            let mut state = self.state.lock().await;
            if prepare_content(&state.draft).is_err() {
                return SendOutcome::Rejected(SendRejection::EmptyInput);
            }
            std::mem::take(&mut state.draft)
        };
        self.send_text(&draft).await
    }

    /// Appends an optimistic entry, dispatches it and merges the reply.
    /// Service failures are recorded in the buffer and never returned as errors.
    pub async fn send_text(&self, text: &str) -> SendOutcome {
        let Some(project_id) = self.key.project_id.as_deref() else {
            return SendOutcome::Rejected(SendRejection::NoProject);
        };
        let content = match prepare_content(text) {
            Ok(content) => content,
            Err(rejection) => return SendOutcome::Rejected(rejection),
        };

        let (pending, generation) = {
            let mut state = self.state.lock().await;
            if state.closed {
                return SendOutcome::Rejected(SendRejection::Closed);
            }
            let pending = PendingSend {
                local_id: state.local_ids.allocate(),
                correlation_id: CorrelationId::new_v7(),
                content,
            };
            state.scroll.note_mutation(LoadMode::Append);
            state.store.append(vec![ChatMessage::local_user(
                pending.local_id,
                pending.correlation_id,
                pending.content.clone(),
            )]);
            state.scroll.request_scroll_to_bottom();
            state.send = SendState::Pending {
                correlation_id: pending.correlation_id,
            };
            (pending, state.pagination.generation())
        };

        let request = SendMessageRequest::new(self.key.stage, pending.content.clone())
            .with_search_enabled(self.preferences.search_enabled())
            .with_client_id(pending.correlation_id);
        let result = self.service.send_message(project_id, request).await;

        let (outcome, meta) = {
            let mut state = self.state.lock().await;
            if !self.accepts_reply(&state, generation) {
                tracing::debug!(
                    project_id,
                    stage = %self.key.stage,
                    "discarding reply for a replaced conversation"
                );
                return SendOutcome::Discarded;
            }

            let (outcome, meta) = match result {
                Ok(response) => {
                    let reconciliation = reconcile(&mut state.store, &pending, &response);
                    state.scroll.note_mutation(LoadMode::Append);
                    state.scroll.request_scroll_to_bottom();
                    tracing::info!(
                        project_id,
                        stage = %self.key.stage,
                        user_message_id = response.user_message.id,
                        matched = ?reconciliation.matched,
                        ai_appended = reconciliation.ai_appended,
                        "reconciled sent message"
                    );
                    let meta = reconciliation.meta.clone();
                    (SendOutcome::Reconciled(reconciliation), meta)
                }
                Err(error) => {
                    tracing::warn!(
                        project_id,
                        stage = %self.key.stage,
                        "failed to send message: {}",
                        error
                    );
                    let notice_id = state.local_ids.allocate();
                    state.scroll.note_mutation(LoadMode::Append);
                    record_failure(&mut state.store, notice_id);
                    (SendOutcome::Failed, None)
                }
            };
            state.send = SendState::Settled(outcome.clone());
            (outcome, meta)
        };

        if let Some(meta) = meta {
            self.emitter.emit(meta);
        }
        outcome
    }

    fn accepts_reply(&self, state: &ViewState, generation: LoadGeneration) -> bool {
        !state.closed && state.pagination.generation() == generation
    }

    /// Flips the web-search preference attached to future sends.
    pub fn toggle_search(&self) -> bool {
        match self.preferences.toggle_search_enabled() {
            Ok(enabled) => enabled,
            Err(error) => {
                tracing::warn!("failed to persist search preference: {}", error);
                self.preferences.search_enabled()
            }
        }
    }

    /// Detaches the view; results still in flight are dropped when they land.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.pagination.invalidate();
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        let state = self.state.lock().await;
        let loading = self.loading.is_loading();
        let booting = state.pagination.is_booting();

        ViewSnapshot {
            key: self.key.clone(),
            messages: state.store.messages().to_vec(),
            page: state.pagination.page(),
            has_more: state.pagination.has_more(),
            booting,
            loading,
            load_affordance: LoadAffordance::new(state.pagination.offers_older(), loading),
            notice: stage_notice(self.key.stage, booting, state.store.has_user_message()),
            show_scroll_to_bottom: state.scroll.shows_scroll_to_bottom(),
            draft: state.draft.clone(),
            search_enabled: self.preferences.search_enabled(),
            send_state: state.send.clone(),
            closed: state.closed,
        }
    }
}

impl std::fmt::Debug for ChatView {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ChatView")
            .field("key", &self.key)
            .field("page_size", &self.page_size)
            .field("loading", &self.loading.is_loading())
            .finish_non_exhaustive()
    }
}
