//! Email delivery.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::RwLock;

use crate::NotificationError;

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    /// File attached to the message, read at send time.
    pub attachment: Option<PathBuf>,
}

/// Trait for delivering emails.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends one email.
    async fn send(&self, email: &Email) -> Result<(), NotificationError>;
}

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// SMTP email sender over a STARTTLS relay.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Builds the transport. No connection is made until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotificationError::Email(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: parse_mailbox(&config.from)?,
        })
    }

    async fn build_message(&self, email: &Email) -> Result<Message, NotificationError> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.clone());

        let body = SinglePart::html(email.html_body.clone());
        let message = match &email.attachment {
            Some(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    NotificationError::Email(format!("reading {}: {e}", path.display()))
                })?;
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "invoice.txt".to_string());
                let attachment = Attachment::new(filename).body(bytes, ContentType::TEXT_PLAIN);
                builder.multipart(MultiPart::mixed().singlepart(body).singlepart(attachment))
            }
            None => builder.singlepart(body),
        };

        message.map_err(|e| NotificationError::Email(e.to_string()))
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: &Email) -> Result<(), NotificationError> {
        let message = self.build_message(email).await?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Email(e.to_string()))?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| NotificationError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// A delivered email as seen by [`InMemoryEmailSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub email: Email,
    /// Contents of the attachment at the time of sending.
    pub attachment: Option<Vec<u8>>,
}

/// In-memory email sender for tests and local runs.
///
/// Records every accepted email and logs it instead of delivering it.
#[derive(Clone, Default)]
pub struct InMemoryEmailSender {
    sent: Arc<RwLock<Vec<SentEmail>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Returns every email accepted so far.
    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.read().await.clone()
    }

    /// Returns the emails accepted for one recipient.
    pub async fn sent_to(&self, to: &str) -> Vec<SentEmail> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|s| s.email.to == to)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EmailSender for InMemoryEmailSender {
    async fn send(&self, email: &Email) -> Result<(), NotificationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Email("mail delivery disabled".to_string()));
        }
        parse_mailbox(&email.to)?;

        let attachment = match &email.attachment {
            Some(path) => Some(tokio::fs::read(path).await.map_err(|e| {
                NotificationError::Email(format!("reading {}: {e}", path.display()))
            })?),
            None => None,
        };

        tracing::info!(to = %email.to, subject = %email.subject, "email recorded");
        self.sent.write().await.push(SentEmail {
            email: email.clone(),
            attachment,
        });
        Ok(())
    }
}
