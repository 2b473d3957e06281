use std::sync::Arc;

mod http;
mod paging;
mod service;

pub use http::HttpConversationService;
pub use paging::{
    ConversationPage, DEFAULT_PAGE_SIZE, fetch_messages_page, paginate, parse_timestamp,
    sort_chronologically,
};
pub use service::{
    BoxFuture, ConversationService, DEFAULT_REQUEST_TIMEOUT, ServiceConfig, ServiceError,
    ServiceResult,
};

pub fn create_service(config: ServiceConfig) -> ServiceResult<Arc<dyn ConversationService>> {
    Ok(Arc::new(HttpConversationService::new(config)?))
}
