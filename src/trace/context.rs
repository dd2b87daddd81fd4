//! Trace identities and their propagation across process boundaries.

use std::fmt;
use std::str::FromStr;

/// B3 header carrying the trace id.
pub const B3_TRACE_ID: &str = "x-b3-traceid";
/// B3 header carrying the span id.
pub const B3_SPAN_ID: &str = "x-b3-spanid";
/// B3 header carrying the parent span id.
pub const B3_PARENT_SPAN_ID: &str = "x-b3-parentspanid";

fn nonzero_u64() -> u64 {
    // Zero is the reserved "absent" value in most tracing systems; never
    // mint it.
    loop {
        let v = rand::random::<u64>();
        if v != 0 {
            return v;
        }
    }
}

// ── TraceId ───────────────────────────────────────────────────────────────────

/// Identifies a whole trace. 64-bit by default on the wire, 128-bit when the
/// tracer is configured for it (`hi` is zero in the 64-bit case).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TraceId {
    pub(crate) hi: u64,
    pub(crate) lo: u64,
}

impl TraceId {
    pub(crate) fn random(use_128bit: bool) -> Self {
        Self {
            hi: if use_128bit { nonzero_u64() } else { 0 },
            lo: nonzero_u64(),
        }
    }

    pub fn is_128bit(&self) -> bool {
        self.hi != 0
    }
}

/// Lowercase hex: 16 chars for 64-bit ids, 32 for 128-bit.
impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hi == 0 {
            write!(f, "{:016x}", self.lo)
        } else {
            write!(f, "{:016x}{:016x}", self.hi, self.lo)
        }
    }
}

/// Parses the hex wire form. Up to 16 chars is a 64-bit id, 17 to 32 chars a
/// 128-bit one. Zero is rejected.
impl FromStr for TraceId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.len() {
            1..=16 => {
                let lo = u64::from_str_radix(s, 16).map_err(|_| ())?;
                if lo == 0 {
                    return Err(());
                }
                Ok(Self { hi: 0, lo })
            }
            17..=32 => {
                let (hi_part, lo_part) = s.split_at(s.len() - 16);
                let hi = u64::from_str_radix(hi_part, 16).map_err(|_| ())?;
                let lo = u64::from_str_radix(lo_part, 16).map_err(|_| ())?;
                if hi == 0 && lo == 0 {
                    return Err(());
                }
                Ok(Self { hi, lo })
            }
            _ => Err(()),
        }
    }
}

// ── SpanId ────────────────────────────────────────────────────────────────────

/// Identifies one span within a trace.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SpanId(pub(crate) u64);

impl SpanId {
    pub(crate) fn random() -> Self {
        Self(nonzero_u64())
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 16 {
            return Err(());
        }
        let id = u64::from_str_radix(s, 16).map_err(|_| ())?;
        if id == 0 {
            return Err(());
        }
        Ok(Self(id))
    }
}

// ── TraceContext ──────────────────────────────────────────────────────────────

/// The identity a span hands to its children and to the wire.
///
/// Copyable on purpose: a context is pure identity, never a handle on the
/// span's lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_id: Option<SpanId>,
}

impl TraceContext {
    /// Reads B3 propagation headers through `lookup`.
    ///
    /// Returns `None` unless both the trace id and the span id are present
    /// and parse; a malformed inbound trace is treated as no trace at all.
    ///
    /// ```rust
    /// # use filament::trace::TraceContext;
    /// # let req = filament::Request::new(filament::Method::Get, "/");
    /// let inbound = TraceContext::extract(|name| req.header(name));
    /// ```
    pub fn extract<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Option<Self> {
        let trace_id = lookup(B3_TRACE_ID)?.parse().ok()?;
        let span_id = lookup(B3_SPAN_ID)?.parse().ok()?;
        let parent_id = lookup(B3_PARENT_SPAN_ID).and_then(|v| v.parse().ok());
        Some(Self { trace_id, span_id, parent_id })
    }

    /// Writes B3 propagation headers through `store`.
    pub fn inject(&self, mut store: impl FnMut(&'static str, String)) {
        store(B3_TRACE_ID, self.trace_id.to_string());
        store(B3_SPAN_ID, self.span_id.to_string());
        if let Some(parent) = self.parent_id {
            store(B3_PARENT_SPAN_ID, parent.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn trace_id_round_trips_both_widths() {
        let narrow = TraceId { hi: 0, lo: 0x00ab_cdef_0123_4567 };
        assert_eq!(narrow.to_string(), "00abcdef01234567");
        assert_eq!(narrow.to_string().parse::<TraceId>(), Ok(narrow));

        let wide = TraceId { hi: 0x1111_2222_3333_4444, lo: 0x5555_6666_7777_8888 };
        assert_eq!(wide.to_string().len(), 32);
        assert_eq!(wide.to_string().parse::<TraceId>(), Ok(wide));
    }

    #[test]
    fn rejects_zero_and_garbage_ids() {
        assert!("0000000000000000".parse::<TraceId>().is_err());
        assert!("".parse::<TraceId>().is_err());
        assert!("not-hex".parse::<TraceId>().is_err());
        assert!("0".parse::<SpanId>().is_err());
        assert!("00112233445566778899".parse::<SpanId>().is_err());
    }

    #[test]
    fn extract_needs_trace_and_span() {
        let mut headers = HashMap::new();
        headers.insert(B3_TRACE_ID, "00abcdef01234567");
        assert!(TraceContext::extract(|k| headers.get(k).copied()).is_none());

        headers.insert(B3_SPAN_ID, "0000000000000abc");
        let ctx = TraceContext::extract(|k| headers.get(k).copied())
            .expect("both ids present");
        assert_eq!(ctx.trace_id.to_string(), "00abcdef01234567");
        assert_eq!(ctx.span_id.to_string(), "0000000000000abc");
        assert_eq!(ctx.parent_id, None);
    }

    #[test]
    fn inject_writes_what_extract_reads() {
        let ctx = TraceContext {
            trace_id: TraceId { hi: 0, lo: 77 },
            span_id: SpanId(42),
            parent_id: Some(SpanId(7)),
        };
        let mut carrier: HashMap<&'static str, String> = HashMap::new();
        ctx.inject(|name, value| {
            carrier.insert(name, value);
        });
        let back = TraceContext::extract(|k| carrier.get(k).map(String::as_str))
            .expect("carrier is complete");
        assert_eq!(back, ctx);
    }
}
