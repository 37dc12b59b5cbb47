//! Push delivery of freshly issued NKeys to the owner's device.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::PushDeerConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rejected with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, endpoint: &str, message: &str) -> Result<(), NotifyError>;
}

/// Delivers through the PushDeer HTTP API: a form post of `pushkey` and `text`.
#[derive(Clone)]
pub struct PushDeerNotifier {
    client: reqwest::Client,
    api_url: String,
}

impl PushDeerNotifier {
    pub fn new(config: &PushDeerConfig) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build PushDeer client: {}", e))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }
}

#[async_trait]
impl Notifier for PushDeerNotifier {
    async fn send(&self, endpoint: &str, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.api_url)
            .form(&[("pushkey", endpoint), ("text", message)])
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Sends on a detached task. Delivery errors are logged at `warn` and
/// dropped; the caller never observes them. The handle is returned only so
/// tests can await completion.
pub fn dispatch(notifier: Arc<dyn Notifier>, endpoint: String, message: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.send(&endpoint, &message).await {
            Ok(()) => tracing::debug!("Push notification delivered"),
            Err(e) => tracing::warn!(error = %e, "Push notification failed"),
        }
    })
}

/// Records messages instead of sending them.
#[derive(Default)]
pub struct MockNotifier {
    messages: Mutex<Vec<(String, String)>>,
    arrived: Notify,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records each attempt, then reports a transport failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Waits until at least `count` messages were recorded or `timeout` passes.
    pub async fn wait_for_messages(&self, count: usize, timeout: Duration) -> Vec<(String, String)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = self.messages();
            if current.len() >= count {
                return current;
            }
            if tokio::time::timeout_at(deadline, self.arrived.notified())
                .await
                .is_err()
            {
                return self.messages();
            }
        }
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, endpoint: &str, message: &str) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .map_err(|_| NotifyError::Transport("mock notifier lock poisoned".to_string()))?
            .push((endpoint.to_string(), message.to_string()));
        self.arrived.notify_one();

        if self.fail {
            return Err(NotifyError::Transport("mock transport failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_swallows_delivery_errors() {
        let notifier = Arc::new(MockNotifier::failing());
        let handle = dispatch(notifier.clone(), "key".into(), "hello".into());

        handle.await.expect("task must not panic on delivery failure");
        assert_eq!(notifier.messages(), vec![("key".to_string(), "hello".to_string())]);
    }

    #[tokio::test]
    async fn wait_for_messages_times_out_quietly() {
        let notifier = MockNotifier::new();
        let got = notifier
            .wait_for_messages(1, Duration::from_millis(20))
            .await;
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn pushdeer_reports_transport_errors() {
        let notifier = PushDeerNotifier::new(&PushDeerConfig {
            api_url: "http://127.0.0.1:9/message/push".to_string(),
            timeout_seconds: 1,
        })
        .unwrap();

        let err = notifier.send("key", "text").await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
    }
}
