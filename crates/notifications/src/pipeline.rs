//! Bounded invoice queue and its worker pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::Invoice;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::retention::RetentionScheduler;
use crate::{EmailSender, InvoiceRenderer, NotificationError, templates};

/// Accepts invoices for asynchronous delivery.
#[async_trait]
pub trait InvoiceSink: Send + Sync {
    /// Queues an invoice. Waits for a free slot when the queue is full.
    async fn enqueue(&self, invoice: Invoice) -> Result<(), NotificationError>;
}

/// Pipeline sizing.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub workers: usize,
    pub retention: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            workers: 2,
            retention: Duration::from_secs(20),
        }
    }
}

/// What happens to queued invoices on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Process everything already queued.
    Drain,
    /// Drop queued invoices without processing them.
    Discard,
}

/// Counters reported by [`NotificationPipeline::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    pub processed: u64,
    pub discarded: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    discarded: AtomicU64,
}

struct Worker {
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Invoice>>>,
    closing: CancellationToken,
    discard: Arc<AtomicBool>,
    renderer: Arc<dyn InvoiceRenderer>,
    sender: Arc<dyn EmailSender>,
    retention: RetentionScheduler,
    counters: Arc<Counters>,
}

/// A running notification pipeline.
///
/// Invoices go in through [`NotificationHandle`]s and are processed by
/// `workers` tasks in queue order per worker. Dropping the pipeline
/// without calling [`NotificationPipeline::shutdown`] leaves the workers
/// running until the runtime stops.
pub struct NotificationPipeline {
    handle: NotificationHandle,
    closing: CancellationToken,
    discard: Arc<AtomicBool>,
    workers: TaskTracker,
    retention: RetentionScheduler,
    counters: Arc<Counters>,
}

impl NotificationPipeline {
    /// Spawns the worker pool. Must be called within a tokio runtime.
    pub fn start(
        config: PipelineConfig,
        renderer: Arc<dyn InvoiceRenderer>,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let queue = Arc::new(Mutex::new(rx));
        let closing = CancellationToken::new();
        let discard = Arc::new(AtomicBool::new(false));
        let retention = RetentionScheduler::new(config.retention);
        let counters = Arc::new(Counters::default());
        let workers = TaskTracker::new();

        let worker_count = config.workers.max(1);
        for id in 0..worker_count {
            let worker = Worker {
                id,
                queue: queue.clone(),
                closing: closing.clone(),
                discard: discard.clone(),
                renderer: renderer.clone(),
                sender: sender.clone(),
                retention: retention.clone(),
                counters: counters.clone(),
            };
            workers.spawn(worker.run());
        }

        tracing::info!(
            workers = worker_count,
            queue_capacity = config.queue_capacity,
            retention_secs = config.retention.as_secs(),
            "notification pipeline started"
        );

        Self {
            handle: NotificationHandle {
                tx,
                closing: closing.clone(),
            },
            closing,
            discard,
            workers,
            retention,
            counters,
        }
    }

    /// Returns a handle for enqueueing invoices.
    pub fn handle(&self) -> NotificationHandle {
        self.handle.clone()
    }

    /// Stops accepting invoices, then drains or discards the queue and
    /// waits for every worker and retention timer to finish.
    ///
    /// Pending retention timers are cut short: their files are deleted
    /// immediately.
    pub async fn shutdown(self, mode: ShutdownMode) -> ShutdownReport {
        tracing::info!(?mode, "notification pipeline shutting down");
        if mode == ShutdownMode::Discard {
            self.discard.store(true, Ordering::SeqCst);
        }
        self.closing.cancel();

        self.workers.close();
        self.workers.wait().await;
        self.retention.shutdown().await;

        let report = ShutdownReport {
            processed: self.counters.processed.load(Ordering::SeqCst),
            discarded: self.counters.discarded.load(Ordering::SeqCst),
        };
        tracing::info!(
            processed = report.processed,
            discarded = report.discarded,
            "notification pipeline stopped"
        );
        report
    }
}

/// Cloneable sending side of a [`NotificationPipeline`].
#[derive(Clone)]
pub struct NotificationHandle {
    tx: mpsc::Sender<Invoice>,
    closing: CancellationToken,
}

impl NotificationHandle {
    /// Returns true once shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled() || self.tx.is_closed()
    }

    /// Number of free queue slots.
    pub fn available_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

#[async_trait]
impl InvoiceSink for NotificationHandle {
    async fn enqueue(&self, invoice: Invoice) -> Result<(), NotificationError> {
        if self.closing.is_cancelled() {
            return Err(NotificationError::PipelineClosed);
        }

        let invoice_id = invoice.invoice_id;
        tokio::select! {
            sent = self.tx.send(invoice) => {
                sent.map_err(|_| NotificationError::PipelineClosed)?;
            }
            _ = self.closing.cancelled() => return Err(NotificationError::PipelineClosed),
        }

        metrics::counter!("notifications_enqueued_total").increment(1);
        tracing::debug!(%invoice_id, "invoice queued");
        Ok(())
    }
}

impl Worker {
    async fn run(self) {
        tracing::debug!(worker = self.id, "notification worker started");
        while let Some(invoice) = self.next().await {
            if self.discard.load(Ordering::SeqCst) {
                self.counters.discarded.fetch_add(1, Ordering::SeqCst);
                metrics::counter!("notifications_discarded_total").increment(1);
                tracing::warn!(invoice_id = %invoice.invoice_id, "queued invoice discarded");
                continue;
            }
            self.process(&invoice).await;
        }
        tracing::debug!(worker = self.id, "notification worker stopped");
    }

    /// Takes the next invoice. Once closing, the channel is closed and the
    /// remaining buffer is handed out until it is empty.
    async fn next(&self) -> Option<Invoice> {
        let mut queue = self.queue.lock().await;
        tokio::select! {
            biased;
            invoice = queue.recv() => invoice,
            _ = self.closing.cancelled() => {
                queue.close();
                queue.recv().await
            }
        }
    }

    #[tracing::instrument(
        skip(self, invoice),
        fields(worker = self.id, invoice_id = %invoice.invoice_id)
    )]
    async fn process(&self, invoice: &Invoice) {
        let start = std::time::Instant::now();
        let has_recipient = invoice.customer.has_email();

        if has_recipient {
            self.send(&templates::confirmation_email(invoice), "confirmation")
                .await;
        } else {
            tracing::warn!("customer has no email address, skipping mail");
        }

        let document = match self.renderer.render(invoice).await {
            Ok(path) => path,
            Err(e) => {
                metrics::counter!("notifications_render_failures_total").increment(1);
                tracing::error!(error = %e, "invoice rendering failed");
                self.finish(start);
                return;
            }
        };

        if has_recipient {
            self.send(&templates::invoice_email(invoice, &document), "invoice")
                .await;
        }
        self.retention.schedule(document);
        self.finish(start);
    }

    async fn send(&self, email: &crate::Email, kind: &'static str) {
        match self.sender.send(email).await {
            Ok(()) => {
                metrics::counter!("notifications_emails_sent_total", "kind" => kind).increment(1);
            }
            Err(e) => {
                metrics::counter!("notifications_email_failures_total", "kind" => kind)
                    .increment(1);
                tracing::error!(kind, to = %email.to, error = %e, "email delivery failed");
            }
        }
    }

    fn finish(&self, start: std::time::Instant) {
        self.counters.processed.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("notifications_processed_total").increment(1);
        metrics::histogram!("notifications_processing_duration_seconds")
            .record(start.elapsed().as_secs_f64());
    }
}
