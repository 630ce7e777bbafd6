//! Purpose: Explicit client configuration for the dispatcher and its HTTP transport.
//! Exports: `ClientConfig`, `FallbackMode`.
//! Role: Validates the endpoint once so dispatch never fails on configuration.
//! Invariants: Endpoints use http or https and carry no query or fragment.
//! Invariants: No environment variables are read here; callers map their own config.

use crate::core::error::{Error, ErrorKind};
use std::time::Duration;
use url::Url;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FallbackMode {
    /// Retry failed POSTs as a callback-script GET.
    #[default]
    Jsonp,
    /// Resolve failed POSTs with a synthetic failure value.
    Disabled,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    endpoint: Url,
    fallback: FallbackMode,
    fallback_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self, Error> {
        Ok(Self {
            endpoint: normalize_endpoint(endpoint.as_ref())?,
            fallback: FallbackMode::default(),
            fallback_timeout: None,
            request_timeout: None,
        })
    }

    pub fn with_fallback(mut self, fallback: FallbackMode) -> Self {
        self.fallback = fallback;
        self
    }

    /// Bounds how long a loaded fallback script may take to invoke its callback.
    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = Some(timeout);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn fallback(&self) -> FallbackMode {
        self.fallback
    }

    pub fn fallback_timeout(&self) -> Option<Duration> {
        self.fallback_timeout
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}

fn normalize_endpoint(raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw.trim()).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid endpoint url")
            .with_url(raw)
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("endpoint url must use http or https scheme")
            .with_url(raw));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("endpoint url must not include a query or fragment")
            .with_url(raw)
            .with_hint("Pass the deployment url ending in /exec without parameters."));
    }
    Ok(url)
}
