//! Request values used both as work-queue items and cache lookup keys.

use std::collections::BTreeMap;

use crate::Error;
use crate::cache::hash::compute_cache_key;

/// An immutable HTTP request description.
///
/// The URL is validated once on construction; the stored string is the
/// trimmed input, so the cache key matches what callers pass in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    url: String,
    method: String,
    headers: BTreeMap<String, String>,
}

impl Request {
    /// Build a `GET` request for `url`.
    ///
    /// Only `http` and `https` URLs with a host are accepted.
    pub fn new(url: impl AsRef<str>) -> Result<Self, Error> {
        let trimmed = url.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidUrl("empty URL".into()));
        }

        let parsed = url::Url::parse(trimmed).map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(Error::InvalidUrl(format!("{trimmed}: missing host")));
        }

        Ok(Self { url: trimmed.to_string(), method: "GET".into(), headers: BTreeMap::new() })
    }

    /// Replace the HTTP method. Stored upper-cased.
    pub fn with_method(mut self, method: &str) -> Result<Self, Error> {
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::InvalidInput(format!("invalid HTTP method: {method:?}")));
        }
        self.method = method.to_ascii_uppercase();
        Ok(self)
    }

    /// Add a request header. Later values for the same name win.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Stable cache key derived from method and URL. Headers do not participate.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }

    /// Directory name grouping cache records by origin.
    ///
    /// The host, with `_<port>` appended when the URL names a port explicitly.
    pub fn domain(&self) -> String {
        let Ok(parsed) = url::Url::parse(&self.url) else {
            return "unknown".into();
        };
        let host = parsed.host_str().unwrap_or("unknown").to_lowercase();
        match parsed.port() {
            Some(port) => format!("{host}_{port}"),
            None => host,
        }
    }
}
