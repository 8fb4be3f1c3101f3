use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::WebhookConfig;
use crate::fetch::{DISCORD, FetchError, Fetcher};
use crate::util::redact_path;

use super::{AlertSink, SinkError, SinkKind};

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub username: String,
    pub content: String,
}

/// Posts alerts to a Discord webhook through the outbound client
#[derive(Clone)]
pub struct DiscordSink {
    fetcher: Arc<dyn Fetcher>,
    /// Webhook path below the DISCORD service base, empty when disabled
    path: String,
    username: String,
}

impl DiscordSink {
    /// `service_base` is the registry address of the DISCORD service; a full
    /// webhook URL below it is reduced to its path.
    pub fn new(fetcher: Arc<dyn Fetcher>, webhook: &WebhookConfig, service_base: &str) -> Self {
        let url = webhook.url.trim();
        let base = service_base.trim_end_matches('/');
        let path = match url.strip_prefix(base) {
            Some(rest) if !base.is_empty() => rest.to_string(),
            _ => url.to_string(),
        };
        if path.contains("://") {
            warn!(base, "webhook url is outside the discord service base");
        }

        Self {
            fetcher,
            path,
            username: webhook.username.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.path.trim().is_empty()
    }
}

#[async_trait]
impl AlertSink for DiscordSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Discord
    }

    #[instrument(skip_all, fields(path = %redact_path(&self.path)))]
    async fn deliver(&self, message: &str) -> Result<(), SinkError> {
        if !self.is_configured() {
            warn!("discord webhook url is not configured, skipping notification");
            return Ok(());
        }

        let payload = Message {
            username: self.username.clone(),
            content: message.to_string(),
        };
        let body = serde_json::to_value(&payload).map_err(FetchError::from)?;

        debug!("sending discord notification");
        let response = self
            .fetcher
            .post(DISCORD, &self.path, Some(body), None)
            .await?;

        if response.success {
            info!(attempts = response.attempts, "successfully sent Discord message");
            Ok(())
        } else {
            error!(
                status = ?response.code,
                attempts = response.attempts,
                "Discord message failed"
            );
            Err(SinkError::Delivery {
                status: response.code,
                attempts: response.attempts,
                reason: response
                    .error
                    .unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}
