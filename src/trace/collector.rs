//! Span export.
//!
//! Finishing a span must never slow a request down, so [`Collector::submit`]
//! is synchronous and non-blocking. The stock [`HttpCollector`] makes that
//! true by decoupling: `submit` is one channel send, and a background task
//! owns the HTTP side, draining whatever has queued up between posts into a
//! single batch.
//!
//! Export is fire-and-forget. A failed post is logged and the batch is gone;
//! spans are diagnostics, not payload, and retry machinery is a job for the
//! collector service itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::Error;
use super::span::FinishedSpan;

/// A heap-allocated future for trait-object shutdown, same shape as the
/// handler module's erased futures.
pub type FlushFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

// ── Collector trait ───────────────────────────────────────────────────────────

/// Receives every finished span.
pub trait Collector: Send + Sync + 'static {
    /// Accepts one finished span for delivery.
    ///
    /// Must not block: this runs on request tasks, inside `Span::finish` and
    /// span drop guards.
    fn submit(&self, span: FinishedSpan) -> Result<(), Error>;

    /// Delivers everything already submitted, then stops background work.
    /// Spans submitted afterwards are rejected.
    ///
    /// In-process collectors have nothing in flight; the default is a no-op.
    fn shutdown(&self) -> FlushFuture<'_> {
        Box::pin(async {})
    }
}

// ── HttpCollector ─────────────────────────────────────────────────────────────

enum Msg {
    Span(FinishedSpan),
    Shutdown(oneshot::Sender<()>),
}

/// Batching HTTP exporter.
///
/// Spans flow through an unbounded channel to a background task that POSTs
/// them as JSON arrays to the configured endpoint. Cloning shares the same
/// channel and task.
#[derive(Clone, Debug)]
pub struct HttpCollector {
    tx: mpsc::UnboundedSender<Msg>,
}

impl HttpCollector {
    /// Starts the export task posting to `endpoint`.
    ///
    /// Must be called from within a tokio runtime; the task lives until
    /// [`shutdown`](Collector::shutdown) or until every handle (including
    /// every tracer built on it) is gone.
    pub fn spawn(endpoint: impl Into<String>) -> Result<Self, Error> {
        let endpoint = endpoint.into();
        if endpoint.is_empty() {
            return Err(Error::Setup("collector endpoint is empty".to_owned()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Setup(format!("collector http client: {e}")))?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(export_loop(client, endpoint, rx));
        Ok(Self { tx })
    }
}

impl Collector for HttpCollector {
    fn submit(&self, span: FinishedSpan) -> Result<(), Error> {
        self.tx
            .send(Msg::Span(span))
            .map_err(|_| Error::Setup("span collector is not running".to_owned()))
    }

    fn shutdown(&self) -> FlushFuture<'_> {
        let tx = self.tx.clone();
        Box::pin(async move {
            let (ack_tx, ack_rx) = oneshot::channel();
            // If the send fails the task is already gone, which is as shut
            // down as it gets.
            if tx.send(Msg::Shutdown(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        })
    }
}

async fn export_loop(
    client: reqwest::Client,
    endpoint: String,
    mut rx: mpsc::UnboundedReceiver<Msg>,
) {
    let mut batch: Vec<FinishedSpan> = Vec::new();
    loop {
        let Some(msg) = rx.recv().await else {
            // Every sender dropped without an explicit shutdown.
            return;
        };
        let mut shutdown_ack = None;
        enqueue(msg, &mut batch, &mut shutdown_ack);
        // Drain whatever else queued up before going to the wire, so bursts
        // become one POST instead of many.
        while let Ok(msg) = rx.try_recv() {
            enqueue(msg, &mut batch, &mut shutdown_ack);
        }
        post(&client, &endpoint, &mut batch).await;
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
            return;
        }
    }
}

fn enqueue(msg: Msg, batch: &mut Vec<FinishedSpan>, ack: &mut Option<oneshot::Sender<()>>) {
    match msg {
        Msg::Span(span) => batch.push(span),
        Msg::Shutdown(tx) => *ack = Some(tx),
    }
}

async fn post(client: &reqwest::Client, endpoint: &str, batch: &mut Vec<FinishedSpan>) {
    if batch.is_empty() {
        return;
    }
    let body = std::mem::take(batch);
    debug!(spans = body.len(), "exporting span batch");
    match client.post(endpoint).json(&body).send().await {
        Ok(res) if res.status().is_success() => {}
        Ok(res) => warn!(status = res.status().as_u16(), "span export rejected"),
        Err(e) => warn!("span export failed: {e}"),
    }
}

// ── MemoryCollector ───────────────────────────────────────────────────────────

/// Collects spans in memory, never touching the network.
///
/// This is the collector tests hand to a tracer to observe exactly which
/// spans finished and with what tags.
#[derive(Clone, Default)]
pub struct MemoryCollector {
    spans: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything collected so far, in finish order.
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FinishedSpan>> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Collector for MemoryCollector {
    fn submit(&self, span: FinishedSpan) -> Result<(), Error> {
        self.lock().push(span);
        Ok(())
    }
}
