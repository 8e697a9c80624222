/// Delivery backends
///
/// A [`Dispatcher`] hands one communication and its resolved recipients to
/// whatever actually delivers it. Two ship with the worker:
///
/// - [`LogDispatcher`] writes each delivery to the log (the default)
/// - [`WebhookDispatcher`] POSTs the message as JSON to a configured URL,
///   for a relay that talks to the email/SMS/push providers
///
/// # Example
///
/// ```no_run
/// use churchflow_worker::dispatcher::{Dispatcher, DispatchReport, DispatchResult, OutboundMessage};
/// use async_trait::async_trait;
///
/// struct CountingDispatcher;
///
/// #[async_trait]
/// impl Dispatcher for CountingDispatcher {
///     fn name(&self) -> &'static str {
///         "counting"
///     }
///
///     async fn dispatch(&self, message: &OutboundMessage) -> DispatchResult<DispatchReport> {
///         Ok(DispatchReport { delivered: message.recipients.len() })
///     }
/// }
/// ```

use async_trait::async_trait;
use churchflow_shared::models::communication::{Communication, CommunicationChannel, Recipient};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Worth another attempt (network error, timeout, 5xx, 429)
    #[error("Temporary delivery failure: {0}")]
    Transient(String),

    /// Retrying will not help (4xx, bad configuration)
    #[error("Delivery rejected: {0}")]
    Permanent(String),
}

impl DispatchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Transient(_))
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
}

/// Payload handed to a dispatcher (and the webhook body)
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub communication_id: Uuid,
    pub church_id: Uuid,
    pub channel: CommunicationChannel,
    pub subject: Option<String>,
    pub body: String,
    pub recipients: Vec<Recipient>,
}

impl OutboundMessage {
    pub fn new(communication: &Communication, recipients: Vec<Recipient>) -> Self {
        Self {
            communication_id: communication.id,
            church_id: communication.church_id,
            channel: communication.channel,
            subject: communication.subject.clone(),
            body: communication.body.clone(),
            recipients,
        }
    }
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn dispatch(&self, message: &OutboundMessage) -> DispatchResult<DispatchReport>;
}

/// Logs every delivery; nothing leaves the process
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

impl LogDispatcher {
    pub fn new() -> Self {
        LogDispatcher
    }
}

#[async_trait]
impl Dispatcher for LogDispatcher {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn dispatch(&self, message: &OutboundMessage) -> DispatchResult<DispatchReport> {
        for recipient in &message.recipients {
            tracing::info!(
                communication_id = %message.communication_id,
                channel = message.channel.as_str(),
                member_id = %recipient.member_id,
                address = %recipient.address,
                subject = message.subject.as_deref().unwrap_or(""),
                "Delivered"
            );
        }
        Ok(DispatchReport {
            delivered: message.recipients.len(),
        })
    }
}

/// POSTs each message to a relay
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    url: String,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> DispatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("churchflow-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DispatchError::Permanent(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Maps a relay's answer to retry semantics
pub fn classify_status(status: StatusCode) -> Result<(), DispatchError> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(DispatchError::Transient(format!("webhook answered {}", status)))
    } else {
        Err(DispatchError::Permanent(format!("webhook answered {}", status)))
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn dispatch(&self, message: &OutboundMessage) -> DispatchResult<DispatchReport> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| DispatchError::Transient(e.to_string()))?;

        classify_status(response.status())?;
        Ok(DispatchReport {
            delivered: message.recipients.len(),
        })
    }
}
