use thiserror::Error;

/// Errors that can occur in the notification pipeline.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The pipeline has been shut down and accepts no more invoices.
    #[error("Notification pipeline is closed")]
    PipelineClosed,

    /// The invoice document could not be written.
    #[error("Render error: {0}")]
    Render(#[from] std::io::Error),

    /// An email address could not be parsed.
    #[error("Invalid email address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The email could not be built or delivered.
    #[error("Email error: {0}")]
    Email(String),
}
