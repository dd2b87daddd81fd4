//! Span lifecycle: the owned guard, the shared tagging handle, and the
//! finished record that goes to the collector.
//!
//! A span moves through exactly one path: created → tagged any number of
//! times → finished once. The owned [`Span`] guard enforces "finished once"
//! structurally — [`Span::finish`] consumes the guard, and dropping an
//! unfinished guard finishes it — so no code path, including panics and
//! cancelled futures, can leak an open span.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Error;
use super::collector::Collector;
use super::context::TraceContext;
use super::tag;

// ── TagValue ──────────────────────────────────────────────────────────────────

/// A value accepted by `set_tag`.
///
/// Tags are exported as strings, so the value is stringified on insert; the
/// enum exists so call sites can pass status codes and booleans without
/// formatting them first.
pub enum TagValue {
    Str(String),
    Bool(bool),
    Int(i64),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self { Self::Str(v.to_owned()) }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self { Self::Str(v) }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self { Self::Bool(v) }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self { Self::Int(v) }
}

// i32 so bare integer literals work; u16 for status codes.
impl From<i32> for TagValue {
    fn from(v: i32) -> Self { Self::Int(i64::from(v)) }
}

impl From<u16> for TagValue {
    fn from(v: u16) -> Self { Self::Int(i64::from(v)) }
}

// ── Shared state ──────────────────────────────────────────────────────────────

/// Mutable part, behind the lock: what tagging and renaming touch.
struct SpanState {
    name: String,
    tags: BTreeMap<String, String>,
    finished: bool,
}

/// Everything the guard and its handles share.
struct SpanInner {
    context: TraceContext,
    shared: bool,
    service: String,
    debug: bool,
    started_wall: SystemTime,
    started: Instant,
    state: Mutex<SpanState>,
    collector: Arc<dyn Collector>,
}

impl SpanInner {
    fn state(&self) -> MutexGuard<'_, SpanState> {
        // A poisoned lock means some thread panicked mid-tag. The state is
        // still a valid map; keep going rather than cascading the panic.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Span (owned guard) ────────────────────────────────────────────────────────

/// An in-flight span, owned by the layer that started it.
///
/// Finishing is exactly-once by construction: [`finish`](Span::finish)
/// consumes the guard, and a guard dropped without finishing closes itself —
/// tagged [`cancelled`](tag::CANCELLED), or [`error`](tag::ERROR) when the
/// drop happens during a panic unwind.
///
/// Hand [`handle`](Span::handle) to inner layers that need to tag; handles
/// never control the lifecycle.
pub struct Span {
    inner: Arc<SpanInner>,
}

impl Span {
    pub(crate) fn start(
        name: String,
        context: TraceContext,
        shared: bool,
        service: String,
        debug: bool,
        collector: Arc<dyn Collector>,
    ) -> Self {
        if debug {
            debug!(span = %name, trace = %context.trace_id, id = %context.span_id, "span started");
        }
        Self {
            inner: Arc::new(SpanInner {
                context,
                shared,
                service,
                debug,
                started_wall: SystemTime::now(),
                started: Instant::now(),
                state: Mutex::new(SpanState {
                    name,
                    tags: BTreeMap::new(),
                    finished: false,
                }),
                collector,
            }),
        }
    }

    /// The identity this span propagates to children and to the wire.
    pub fn context(&self) -> TraceContext {
        self.inner.context
    }

    /// A cloneable tagging handle for inner layers.
    pub fn handle(&self) -> ActiveSpan {
        ActiveSpan { inner: Arc::clone(&self.inner) }
    }

    /// Records a tag, overwriting any previous value for `key`.
    ///
    /// Infallible: while the guard exists the span cannot have finished.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        self.inner.state().tags.insert(key.into(), value.into().to_string());
    }

    /// Renames the span.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.inner.state().name = name.into();
    }

    /// Completes the span and submits it for export.
    pub fn finish(mut self) {
        self.close(None);
    }

    fn close(&mut self, drop_tag: Option<&'static str>) {
        let mut record = {
            let mut state = self.inner.state();
            if state.finished {
                return;
            }
            state.finished = true;
            FinishedSpan {
                trace_id: self.inner.context.trace_id.to_string(),
                id: self.inner.context.span_id.to_string(),
                parent_id: self.inner.context.parent_id.map(|id| id.to_string()),
                name: std::mem::take(&mut state.name),
                timestamp: self.inner.started_wall
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_micros() as u64)
                    .unwrap_or_default(),
                duration: self.inner.started.elapsed().as_micros() as u64,
                shared: self.inner.shared,
                local_endpoint: Endpoint { service_name: self.inner.service.clone() },
                tags: std::mem::take(&mut state.tags),
            }
        };
        if let Some(key) = drop_tag {
            record.tags.insert(key.to_owned(), "true".to_owned());
        }
        if self.inner.debug {
            debug!(span = %record.name, trace = %record.trace_id, "span finished");
        }
        if let Err(e) = self.inner.collector.submit(record) {
            warn!("span dropped by collector: {e}");
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        // No-op after an explicit finish. Otherwise record how the span
        // ended up on the drop path.
        let drop_tag = if std::thread::panicking() {
            Some(tag::ERROR)
        } else {
            Some(tag::CANCELLED)
        };
        self.close(drop_tag);
    }
}

// ── ActiveSpan (shared handle) ────────────────────────────────────────────────

/// A cloneable, non-owning handle onto an in-flight span.
///
/// Layers below the span's owner tag through this. Once the owner finishes
/// the span every operation here reports [`Error::SpanFinished`] — a late tag
/// is a bug worth hearing about, not something to swallow.
#[derive(Clone)]
pub struct ActiveSpan {
    inner: Arc<SpanInner>,
}

impl ActiveSpan {
    /// The identity of the underlying span.
    pub fn context(&self) -> TraceContext {
        self.inner.context
    }

    /// Records a tag, overwriting any previous value for `key`.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<TagValue>) -> Result<(), Error> {
        let mut state = self.inner.state();
        if state.finished {
            return Err(Error::SpanFinished("set_tag"));
        }
        state.tags.insert(key.into(), value.into().to_string());
        Ok(())
    }

    /// Renames the underlying span.
    pub fn set_name(&self, name: impl Into<String>) -> Result<(), Error> {
        let mut state = self.inner.state();
        if state.finished {
            return Err(Error::SpanFinished("set_name"));
        }
        state.name = name.into();
        Ok(())
    }
}

// ── FinishedSpan ──────────────────────────────────────────────────────────────

/// A completed span, shaped for export.
///
/// Serializes to the zipkin-v2-style JSON the stock collector posts.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedSpan {
    pub trace_id: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub name: String,
    /// Microseconds since the UNIX epoch.
    pub timestamp: u64,
    /// Microseconds.
    pub duration: u64,
    /// True when this span shares its id with the client span of the same
    /// RPC (same-span joins).
    #[serde(skip_serializing_if = "is_false")]
    pub shared: bool,
    pub local_endpoint: Endpoint,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl FinishedSpan {
    /// Tag lookup, mostly for assertions in tests.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// The service that recorded a span.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub service_name: String,
}

fn is_false(v: &bool) -> bool {
    !v
}
