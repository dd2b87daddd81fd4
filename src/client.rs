//! Outbound HTTP calls wrapped in client spans.

use tracing::warn;

use crate::error::Error;
use crate::method::Method;
use crate::trace::{tag, TraceContext, Tracer};

/// An HTTP client whose every call runs inside a span of its own.
///
/// Each call starts a child span of the parent context you pass (or a fresh
/// root with `None`), named `"{method} {path}"`. The span is tagged with
/// `span.kind=client`, the method, the URL, and the configured peer service
/// **before** the request goes out, so a call that never reaches the remote
/// end still exports a fully described span. B3 headers are injected into
/// the outbound request, letting a downstream service join the trace.
///
/// Completion rules:
/// - Any HTTP status, including 4xx/5xx, is a successful call: the span
///   gains `http.status_code` and the response is returned. Deciding whether
///   a 401 is a problem is the caller's business, not the transport's.
/// - A transport failure finishes the span without a status tag and returns
///   [`Error::Transport`].
/// - Cancellation mid-call drops the span guard, which finishes it tagged
///   `cancelled`.
pub struct Client {
    http: reqwest::Client,
    tracer: Tracer,
    peer_service: Option<String>,
}

impl Client {
    pub fn new(tracer: Tracer) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Setup(format!("http client: {e}")))?;
        Ok(Self { http, tracer, peer_service: None })
    }

    /// Names the downstream service; recorded as `peer.service` on every
    /// call span.
    pub fn with_peer_service(mut self, name: impl Into<String>) -> Self {
        self.peer_service = Some(name.into());
        self
    }

    /// `GET url` under `parent`.
    pub async fn get(
        &self,
        parent: Option<&TraceContext>,
        url: &str,
    ) -> Result<reqwest::Response, Error> {
        self.call(parent, Method::Get, url).await
    }

    /// Issues `method url` inside a client span.
    pub async fn call(
        &self,
        parent: Option<&TraceContext>,
        method: Method,
        url: &str,
    ) -> Result<reqwest::Response, Error> {
        let name = format!("{} {}", method, url_path(url));
        let mut span = match parent {
            Some(ctx) => self.tracer.child_span(name, ctx),
            None => self.tracer.span(name),
        };
        span.set_tag(tag::SPAN_KIND, "client");
        span.set_tag(tag::HTTP_METHOD, method.as_str());
        span.set_tag(tag::HTTP_URL, url);
        if let Some(peer) = &self.peer_service {
            span.set_tag(tag::PEER_SERVICE, peer.as_str());
        }

        let mut headers = reqwest::header::HeaderMap::new();
        span.context().inject(|header, value| {
            match reqwest::header::HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.insert(header, value);
                }
                // Ids serialize to plain hex; an unencodable value would be
                // a bug in the id types, not in the caller.
                Err(_) => warn!(header, "skipping unencodable propagation header"),
            }
        });

        let result = self.http
            .request(method.into(), url)
            .headers(headers)
            .send()
            .await;

        match result {
            Ok(response) => {
                span.set_tag(tag::HTTP_STATUS_CODE, response.status().as_u16());
                span.finish();
                Ok(response)
            }
            Err(e) => {
                span.finish();
                Err(Error::Transport(e))
            }
        }
    }
}

/// The path component of `url`, for span names. Falls back to `/` when the
/// URL has no path and to the whole string when it does not look like a URL.
fn url_path(url: &str) -> &str {
    let after_scheme = match url.find("://") {
        Some(i) => &url[i + 3..],
        None => return url,
    };
    let path = match after_scheme.find('/') {
        Some(i) => &after_scheme[i..],
        None => return "/",
    };
    match path.find('?') {
        Some(i) => &path[..i],
        None => path,
    }
}

#[cfg(test)]
mod tests {
    use super::url_path;

    #[test]
    fn extracts_span_name_paths() {
        assert_eq!(url_path("http://localhost:3000/first"), "/first");
        assert_eq!(url_path("https://api.example.com/users/42?full=1"), "/users/42");
        assert_eq!(url_path("http://example.com"), "/");
        assert_eq!(url_path("/already/a/path"), "/already/a/path");
    }
}
