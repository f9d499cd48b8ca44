//! Email delivery abstraction.
//!
//! Recovery codes are delivered synchronously from the request path: the OTP
//! is cached before the send, and a delivery failure surfaces as a 500 while
//! the cached code stays valid for a retry. The trait keeps the transport
//! swappable (SMTP, API) without touching the handlers.
//!
//! The default sender for local dev is [`LogEmailSender`], which logs and
//! returns `Ok(())`.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the recovery flow.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to fail the request.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "email send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{EmailMessage, EmailSender, LogEmailSender};

    #[test]
    fn log_sender_always_succeeds() {
        let message = EmailMessage {
            to: "alice@example.com".to_string(),
            subject: "Your verification code".to_string(),
            body: "123456".to_string(),
        };
        assert!(LogEmailSender.send(&message).is_ok());
    }
}
