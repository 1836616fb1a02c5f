//! Asynchronous post-order notifications.
//!
//! A [`NotificationPipeline`] owns a bounded queue of [`domain::Invoice`]
//! messages and a fixed pool of workers. Each worker mails an order
//! confirmation, renders the invoice, mails it as an attachment and
//! schedules the rendered file for deletion.

pub mod email;
pub mod error;
pub mod pipeline;
pub mod renderer;
pub mod retention;
pub mod templates;

pub use email::{Email, EmailSender, InMemoryEmailSender, SentEmail, SmtpConfig, SmtpEmailSender};
pub use error::NotificationError;
pub use pipeline::{
    InvoiceSink, NotificationHandle, NotificationPipeline, PipelineConfig, ShutdownMode,
    ShutdownReport,
};
pub use renderer::{InvoiceRenderer, TextInvoiceRenderer};
pub use retention::RetentionScheduler;
