//! Outbound mail: message type, transport seam and the background outbox.

mod outbox;
pub mod templates;

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

pub use outbox::Outbox;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("mail queue is full")]
    QueueFull,
    #[error("mail queue is closed")]
    Closed,
}

/// The relay that actually delivers a message. Sends run on the blocking
/// pool, so implementations may block on I/O.
pub trait MailTransport: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// What workflows use to hand off a message; never blocks and never fails the caller.
pub trait Mailer: Send + Sync {
    fn dispatch(&self, message: MailMessage);
}

/// Transport used when no relay is configured: records the envelope in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            subject = %message.subject,
            recipients = ?message.recipients,
            "mail delivered to log transport"
        );
        Ok(())
    }
}

/// Captures every message; serves as both transport and mailer in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    messages: Arc<Mutex<Vec<MailMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<MailMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<MailMessage> {
        self.messages()
            .into_iter()
            .filter(|message| message.recipients.iter().any(|r| r == recipient))
            .collect()
    }

    fn push(&self, message: MailMessage) -> Result<(), MailError> {
        self.messages
            .lock()
            .map_err(|_| MailError::Transport("mailbox mutex poisoned".to_string()))?
            .push(message);
        Ok(())
    }
}

impl MailTransport for MemoryMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.push(message.clone())
    }
}

impl Mailer for MemoryMailer {
    fn dispatch(&self, message: MailMessage) {
        let _ = self.push(message);
    }
}

impl<T: Mailer + ?Sized> Mailer for Arc<T> {
    fn dispatch(&self, message: MailMessage) {
        (**self).dispatch(message)
    }
}
