use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use ideasense_types::{ConversationMessage, SendMessageRequest, SendMessageResponse, Stage};
use snafu::Snafu;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            access_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        let access_token = access_token.into().trim().to_string();
        self.access_token = (!access_token.is_empty()).then_some(access_token);
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ServiceError {
    #[snafu(display("conversation service base url '{base_url}' is invalid"))]
    InvalidBaseUrl {
        stage: &'static str,
        base_url: String,
    },
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request to {path} failed on `{stage}`: {source}"))]
    Request {
        stage: &'static str,
        path: String,
        source: reqwest::Error,
    },
    #[snafu(display("invalid JSON response from {path}: {source}"))]
    InvalidJson {
        stage: &'static str,
        path: String,
        source: serde_json::Error,
    },
    #[snafu(display("{code}: {message}"))]
    Api {
        stage: &'static str,
        status: u16,
        code: String,
        message: String,
    },
    #[snafu(display("request to {path} was rejected as unauthorized"))]
    Unauthorized { stage: &'static str, path: String },
    #[snafu(display("empty data in response from {path}"))]
    EmptyData { stage: &'static str, path: String },
    #[snafu(display("page {page} is out of range, pages start at 1"))]
    InvalidPage { stage: &'static str, page: usize },
    #[snafu(display("conversation service unavailable: {details}"))]
    Unavailable {
        stage: &'static str,
        details: String,
    },
}

/// Remote store of staged conversations, one history per (project, stage).
pub trait ConversationService: Send + Sync {
    /// Returns the full history for the stage; ordering is not guaranteed.
    fn list_messages<'a>(
        &'a self,
        project_id: &'a str,
        stage: Stage,
    ) -> BoxFuture<'a, ServiceResult<Vec<ConversationMessage>>>;

    fn send_message<'a>(
        &'a self,
        project_id: &'a str,
        request: SendMessageRequest,
    ) -> BoxFuture<'a, ServiceResult<SendMessageResponse>>;
}
