//! Mail sender collaborator contract.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Outbound mail seam. Template rendering and transport live behind it;
/// callers pass a template id plus a JSON context.
pub trait Mailer: Send + Sync {
    fn send(
        &self,
        template: &str,
        recipient: &str,
        context: &serde_json::Value,
    ) -> Result<(), MailerError>;
}

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub template: String,
    pub recipient: String,
    pub context: serde_json::Value,
}

/// Recording fake for tests.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_with_template(&self, template: &str) -> Vec<SentEmail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.template == template)
            .cloned()
            .collect()
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Mailer for RecordingMailer {
    fn send(
        &self,
        template: &str,
        recipient: &str,
        context: &serde_json::Value,
    ) -> Result<(), MailerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailerError::Delivery("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            template: template.to_string(),
            recipient: recipient.to_string(),
            context: context.clone(),
        });
        Ok(())
    }
}
