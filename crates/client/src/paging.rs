use chrono::{DateTime, NaiveDateTime, Utc};
use ideasense_types::{ConversationMessage, ConversationMeta, Stage};
use snafu::ensure;

use super::service::{ConversationService, InvalidPageSnafu, ServiceResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// One newest-first page of a conversation, plus the conversation-wide meta.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationPage {
    pub page: usize,
    /// Ascending by `created_at`, summary records removed.
    pub items: Vec<ConversationMessage>,
    pub has_more: bool,
    pub meta: ConversationMeta,
    /// Id of the latest record carrying a defined completion flag; only that
    /// record may display the stage-complete notice.
    pub latest_completed_id: Option<i64>,
}

/// Fetches the whole stage history and slices the requested page client-side.
pub async fn fetch_messages_page(
    service: &dyn ConversationService,
    project_id: &str,
    stage: Stage,
    page: usize,
    page_size: usize,
) -> ServiceResult<ConversationPage> {
    ensure!(
        page >= 1 && page_size >= 1,
        InvalidPageSnafu {
            stage: "fetch-messages-page",
            page,
        }
    );

    let messages = service.list_messages(project_id, stage).await?;
    tracing::debug!(
        project_id,
        %stage,
        page,
        total = messages.len(),
        "fetched conversation history"
    );
    paginate(messages, page, page_size)
}

/// Page `p` covers `[max(total - p * size, 0), total - (p - 1) * size)` of the
/// chronologically sorted history.
pub fn paginate(
    mut messages: Vec<ConversationMessage>,
    page: usize,
    page_size: usize,
) -> ServiceResult<ConversationPage> {
    ensure!(
        page >= 1 && page_size >= 1,
        InvalidPageSnafu {
            stage: "paginate",
            page,
        }
    );

    sort_chronologically(&mut messages);

    let total = messages.len();
    let start = total.saturating_sub(page.saturating_mul(page_size));
    let end = total.saturating_sub((page - 1).saturating_mul(page_size));

    let meta = ConversationMeta::scan(&messages);
    let latest_completed_id = messages
        .iter()
        .rev()
        .find(|message| message.has_completion_flag())
        .map(|message| message.id);

    let items = messages
        .drain(start..end)
        .filter(|message| !message.is_summary())
        .collect();

    Ok(ConversationPage {
        page,
        items,
        has_more: start > 0,
        meta,
        latest_completed_id,
    })
}

/// Stable ascending sort by `created_at`. Records whose timestamp cannot be
/// parsed sort first, keeping their relative order.
pub fn sort_chronologically(messages: &mut [ConversationMessage]) {
    messages.sort_by_key(|message| parse_timestamp(&message.created_at));
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    // Offset-less timestamps are read as UTC.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .into_iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ideasense_types::{MessageRole, SendMessageRequest, SendMessageResponse};
    use serde_json::json;

    use super::*;
    use crate::service::{BoxFuture, ServiceError};

    fn message(id: i64, minute: u32) -> ConversationMessage {
        ConversationMessage {
            id,
            role: if id % 2 == 0 {
                MessageRole::Ai
            } else {
                MessageRole::User
            },
            content: format!("message {id}"),
            created_at: format!("2024-05-01T{:02}:{:02}:00Z", minute / 60, minute % 60),
            summary_text: None,
            verification: None,
            is_summary: None,
            is_completed: None,
            client_id: None,
        }
    }

    fn history(count: i64) -> Vec<ConversationMessage> {
        (1..=count).map(|id| message(id, id as u32)).collect()
    }

    fn ids(page: &ConversationPage) -> Vec<i64> {
        page.items.iter().map(|message| message.id).collect()
    }

    #[test]
    fn forty_five_messages_split_into_two_full_pages_and_a_tail() {
        let first = paginate(history(45), 1, 20).unwrap();
        assert_eq!(ids(&first), (26..=45).collect::<Vec<_>>());
        assert!(first.has_more);

        let second = paginate(history(45), 2, 20).unwrap();
        assert_eq!(ids(&second), (6..=25).collect::<Vec<_>>());
        assert!(second.has_more);

        let third = paginate(history(45), 3, 20).unwrap();
        assert_eq!(ids(&third), (1..=5).collect::<Vec<_>>());
        assert!(!third.has_more);
    }

    #[test]
    fn pages_past_the_end_are_empty() {
        let page = paginate(history(5), 4, 20).unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn page_zero_is_rejected() {
        let error = paginate(history(3), 0, 20).unwrap_err();
        assert!(matches!(error, ServiceError::InvalidPage { page: 0, .. }));
    }

    #[test]
    fn sorts_unordered_history_before_slicing() {
        let mut messages = history(4);
        messages.reverse();
        messages[0].created_at = "2024-05-01 00:10:00".to_string();

        let page = paginate(messages, 1, 3).unwrap();
        assert_eq!(ids(&page), vec![2, 3, 4]);
        assert!(page.has_more);
    }

    #[test]
    fn summary_records_only_surface_through_meta() {
        let mut messages = history(3);
        messages[1].is_summary = Some(true);
        messages[1].summary_text = Some("Problem: onboarding churn".to_string());
        messages[2].is_completed = Some(json!("Y"));

        let page = paginate(messages, 1, 20).unwrap();
        assert_eq!(ids(&page), vec![1, 3]);
        assert_eq!(
            page.meta.summary_text.as_deref(),
            Some("Problem: onboarding churn")
        );
        assert_eq!(page.meta.is_complete, Some(true));
        assert_eq!(page.latest_completed_id, Some(3));
    }

    #[test]
    fn meta_reflects_the_whole_history_not_the_page() {
        let mut messages = history(30);
        messages[0].is_completed = Some(json!(1));

        let newest = paginate(messages, 1, 20).unwrap();
        assert_eq!(newest.meta.is_complete, Some(true));
        assert_eq!(newest.latest_completed_id, Some(1));
    }

    #[test]
    fn parses_offsetless_and_fractional_timestamps() {
        assert!(parse_timestamp("2024-05-01T10:00:00.123456").is_some());
        assert!(parse_timestamp("2024-05-01T10:00:00+08:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    struct FixedService {
        messages: Vec<ConversationMessage>,
        requests: Mutex<Vec<(String, Stage)>>,
    }

    impl ConversationService for FixedService {
        fn list_messages<'a>(
            &'a self,
            project_id: &'a str,
            stage: Stage,
        ) -> BoxFuture<'a, ServiceResult<Vec<ConversationMessage>>> {
            self.requests
                .lock()
                .unwrap()
                .push((project_id.to_string(), stage));
            let messages = self.messages.clone();
            Box::pin(async move { Ok(messages) })
        }

        fn send_message<'a>(
            &'a self,
            _project_id: &'a str,
            _request: SendMessageRequest,
        ) -> BoxFuture<'a, ServiceResult<SendMessageResponse>> {
            Box::pin(async {
                Err(ServiceError::Unavailable {
                    stage: "fixed-service-send",
                    details: "read-only fixture".to_string(),
                })
            })
        }
    }

    #[tokio::test]
    async fn fetch_pages_through_the_service() {
        let service = FixedService {
            messages: history(25),
            requests: Mutex::new(Vec::new()),
        };

        let page = fetch_messages_page(&service, "p1", Stage::Market, 2, 20)
            .await
            .unwrap();
        assert_eq!(ids(&page), (1..=5).collect::<Vec<_>>());
        assert_eq!(
            service.requests.lock().unwrap().as_slice(),
            &[("p1".to_string(), Stage::Market)]
        );
    }
}
