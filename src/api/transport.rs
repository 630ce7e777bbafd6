//! Purpose: Wire operations the dispatcher needs, plus the ureq-backed HTTP implementation.
//! Exports: `Transport`, `HttpTransport`, `FORM_CONTENT_TYPE`.
//! Role: Seam between dispatch policy and the network; tests substitute in-memory fakes.
//! Invariants: POST sends only the form content type, which never triggers a CORS preflight.
//! Invariants: POST returns non-2xx bodies to the caller; script loads treat non-2xx as failure.

use crate::core::error::{Error, ErrorKind};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

pub trait Transport: Send + Sync {
    /// POSTs a form-encoded body and returns the raw response text.
    fn post_form(&self, endpoint: &Url, body: &str) -> Result<String, Error>;

    /// GETs a script resource and returns its source text.
    fn load_script(&self, url: &Url) -> Result<String, Error>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn post_form(&self, endpoint: &Url, body: &str) -> Result<String, Error> {
        (**self).post_form(endpoint, body)
    }

    fn load_script(&self, url: &Url) -> Result<String, Error> {
        (**self).load_script(url)
    }
}

#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(request_timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, endpoint: &Url, body: &str) -> Result<String, Error> {
        let response = self
            .agent
            .post(endpoint.as_str())
            .set("Content-Type", FORM_CONTENT_TYPE)
            .send_string(body);
        match response {
            Ok(resp) => read_body(resp, endpoint),
            Err(ureq::Error::Status(code, resp)) => {
                debug!(status = code, "primary request returned non-success status");
                read_body(resp, endpoint)
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_url(endpoint.as_str())
                .with_source(err)),
        }
    }

    fn load_script(&self, url: &Url) -> Result<String, Error> {
        match self.agent.get(url.as_str()).call() {
            Ok(resp) => read_body(resp, url),
            Err(ureq::Error::Status(code, _resp)) => Err(Error::new(ErrorKind::Io)
                .with_message("script load failed")
                .with_status(code)
                .with_url(url.as_str())),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("script load failed")
                .with_url(url.as_str())
                .with_source(err)),
        }
    }
}

fn read_body(response: ureq::Response, url: &Url) -> Result<String, Error> {
    response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_url(url.as_str())
            .with_source(err)
    })
}
