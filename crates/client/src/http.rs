use ideasense_types::{ConversationMessage, SendMessageRequest, SendMessageResponse, Stage};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use snafu::{OptionExt, ResultExt};

use super::service::{
    ApiSnafu, BoxFuture, BuildHttpClientSnafu, ConversationService, EmptyDataSnafu,
    InvalidBaseUrlSnafu, InvalidJsonSnafu, RequestSnafu, ServiceConfig, ServiceResult,
    UnauthorizedSnafu,
};

/// Unified response envelope: every endpoint answers `{ data, error }`.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ConversationListResponse {
    messages: Vec<ConversationMessage>,
}

pub struct HttpConversationService {
    client: reqwest::Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpConversationService {
    pub fn new(config: ServiceConfig) -> ServiceResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .context(InvalidBaseUrlSnafu {
                stage: "http-service-new",
                base_url: config.base_url.clone(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context(BuildHttpClientSnafu {
                stage: "build-http-client",
            })?;

        Ok(Self {
            client,
            base_url,
            access_token: config.access_token,
        })
    }

    fn conversations_url(&self, project_id: &str) -> ServiceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()
            .context(InvalidBaseUrlSnafu {
                stage: "build-conversations-url",
                base_url: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .extend(["api", "projects", project_id, "conversations"]);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> ServiceResult<T> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.context(RequestSnafu {
            stage: "send-request",
            path: path.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.context(RequestSnafu {
            stage: "read-response-body",
            path: path.to_string(),
        })?;

        tracing::debug!(%status, path, "conversation service responded");
        decode_envelope(path, status, &body)
    }

    async fn fetch_messages(
        &self,
        project_id: &str,
        stage: Stage,
    ) -> ServiceResult<Vec<ConversationMessage>> {
        let mut url = self.conversations_url(project_id)?;
        url.query_pairs_mut().append_pair("stage", stage.as_str());
        let path = url.path().to_string();

        let response: ConversationListResponse =
            self.execute(self.client.get(url), &path).await?;
        Ok(response.messages)
    }

    async fn post_message(
        &self,
        project_id: &str,
        request: SendMessageRequest,
    ) -> ServiceResult<SendMessageResponse> {
        let url = self.conversations_url(project_id)?;
        let path = url.path().to_string();
        self.execute(self.client.post(url).json(&request), &path)
            .await
    }
}

impl ConversationService for HttpConversationService {
    fn list_messages<'a>(
        &'a self,
        project_id: &'a str,
        stage: Stage,
    ) -> BoxFuture<'a, ServiceResult<Vec<ConversationMessage>>> {
        Box::pin(self.fetch_messages(project_id, stage))
    }

    fn send_message<'a>(
        &'a self,
        project_id: &'a str,
        request: SendMessageRequest,
    ) -> BoxFuture<'a, ServiceResult<SendMessageResponse>> {
        Box::pin(self.post_message(project_id, request))
    }
}

pub(crate) fn decode_envelope<T: DeserializeOwned>(
    path: &str,
    status: StatusCode,
    body: &str,
) -> ServiceResult<T> {
    let envelope = match serde_json::from_str::<ApiEnvelope<T>>(body) {
        Ok(envelope) => envelope,
        Err(_) if status == StatusCode::UNAUTHORIZED => {
            return UnauthorizedSnafu {
                stage: "decode-envelope",
                path: path.to_string(),
            }
            .fail();
        }
        Err(source) => {
            return Err(source).context(InvalidJsonSnafu {
                stage: "decode-envelope",
                path: path.to_string(),
            });
        }
    };

    if status == StatusCode::UNAUTHORIZED {
        return UnauthorizedSnafu {
            stage: "check-status",
            path: path.to_string(),
        }
        .fail();
    }

    if !status.is_success() || envelope.error.is_some() {
        let (code, message) = match envelope.error {
            Some(error) => (error_code_text(&error.code, status), error.message),
            None => (
                status.as_u16().to_string(),
                status.canonical_reason().unwrap_or_default().to_string(),
            ),
        };
        return ApiSnafu {
            stage: "check-status",
            status: status.as_u16(),
            code,
            message,
        }
        .fail();
    }

    envelope.data.context(EmptyDataSnafu {
        stage: "unwrap-data",
        path: path.to_string(),
    })
}

fn error_code_text(code: &serde_json::Value, status: StatusCode) -> String {
    match code {
        serde_json::Value::String(code) if !code.is_empty() => code.clone(),
        serde_json::Value::Number(code) => code.to_string(),
        _ => status.as_u16().to_string(),
    }
}
