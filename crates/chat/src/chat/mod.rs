/// Stage signal delivery to the owning workspace.
pub mod events;
/// Display entries and local id allocation.
pub mod message;
pub mod notice;
pub mod pagination;
pub mod registry;
pub mod scroll_manager;
pub mod send;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;
pub mod view;

pub use events::{MetaSink, StageMetaEmitter, channel_sink, discard_sink};
pub use message::{
    ChatMessage, CompletionOverride, LocalIdAllocator, LocalMessageId, MessageId, Role,
    SEND_FAILED_MESSAGE, STAGE_COMPLETE_MESSAGE,
};
pub use notice::{LoadAffordance, NoticeLayout, StageNotice, stage_notice};
pub use pagination::{LoadOutcome, LoadSkip, LoadingFlag, PAGE_SIZE, PaginationState};
pub use registry::ChatViewRegistry;
pub use scroll_manager::{
    ListenerId, ScrollBehavior, ScrollCommand, ScrollEvents, ScrollHost, ScrollListener,
    ScrollManager, ScrollMetrics, ScrollSubscription,
};
pub use send::{ReconcileMatch, Reconciliation, SendOutcome, SendRejection, SendState};
pub use store::{LoadMode, MessageStore};
pub use view::{ChatView, ViewKey, ViewSnapshot};
