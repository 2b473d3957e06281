use std::sync::Arc;

use ideasense_chat::chat::{ChatViewRegistry, Role, ViewKey, channel_sink};
use ideasense_chat::settings::{PreferenceStore, SettingsStore};
use ideasense_client::{ServiceError, create_service};
use ideasense_types::{Stage, TypesError};
use snafu::{OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
enum DriverError {
    #[snafu(display("usage: ideasense-chat <project-id> <stage> [message...]"))]
    Usage { stage: &'static str },
    #[snafu(display("invalid stage argument on `{stage}`: {source}"))]
    ParseStage {
        stage: &'static str,
        source: TypesError,
    },
    #[snafu(display("failed to create conversation service on `{stage}`: {source}"))]
    CreateService {
        stage: &'static str,
        source: ServiceError,
    },
}

/// Command-line driver for the chat engine.
///
/// Boots the view for one (project, stage) conversation, prints the newest
/// page and optionally sends a message built from the remaining arguments.
#[tokio::main]
async fn main() -> Result<(), DriverError> {
    let settings_store = SettingsStore::load();
    let settings = settings_store.settings();

    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match settings.log_filter.parse::<tracing_subscriber::EnvFilter>() {
            Ok(filter) => filter,
            Err(error) => {
                eprintln!(
                    "WARN: log filter '{}' is invalid ({}); falling back to 'info'",
                    settings.log_filter, error
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let project_id = args.next().context(UsageSnafu {
        stage: "read-project-id",
    })?;
    let stage = args
        .next()
        .context(UsageSnafu {
            stage: "read-stage",
        })?
        .parse::<Stage>()
        .context(ParseStageSnafu {
            stage: "parse-stage",
        })?;
    let message = args.collect::<Vec<_>>().join(" ");

    let service = create_service(settings.to_service_config()).context(CreateServiceSnafu {
        stage: "create-conversation-service",
    })?;
    let (sink, mut meta_rx) = channel_sink();
    let mut registry = ChatViewRegistry::new(service, sink, Arc::new(PreferenceStore::load()));

    let view = registry
        .activate(ViewKey::new(Some(project_id.as_str()), stage))
        .await;
    let outcome = view.boot().await;
    tracing::info!(?outcome, "boot finished");

    if !message.trim().is_empty() {
        let outcome = view.send_text(&message).await;
        tracing::info!(?outcome, "send finished");
    }

    let snapshot = view.snapshot().await;
    if let Some(label) = snapshot.load_affordance.label() {
        println!("[{label}]");
    }
    for entry in &snapshot.messages {
        let speaker = match entry.role {
            Role::User => "you",
            Role::Ai => "ai",
            Role::System => "system",
        };
        println!("{speaker:>6} | {}", entry.text);
    }
    if let Some(notice) = snapshot.notice {
        println!("{:>6} | {}", "notice", notice.text());
    }

    while let Ok(meta) = meta_rx.try_recv() {
        if !meta.applies_to(stage) {
            continue;
        }
        if let Some(summary) = meta.summary_text.as_deref() {
            println!("summary: {summary}");
        }
        if meta.is_complete == Some(true) {
            println!("stage {} is complete", meta.stage);
        }
    }

    Ok(())
}
