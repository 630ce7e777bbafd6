//! Purpose: Send one action to the backend, falling back from form POST to a callback script.
//! Exports: `Dispatcher`, `JSONP_LOAD_FAILURE`, `EMPTY_ACTION`.
//! Role: The only place transport policy lives; entity wrappers and the CLI call through it.
//! Invariants: `dispatch` always returns a `Response`; transport errors never escape.
//! Invariants: The fallback runs at most once per dispatch, and only after a primary failure.
//! Invariants: Remote-reported failures pass through untouched.

use super::config::{ClientConfig, FallbackMode};
use super::response::Response;
use super::transport::{HttpTransport, Transport};
use crate::core::callback::CallbackRegistry;
use crate::core::error::{Error, ErrorKind};
use crate::core::params::{ACTION_KEY, CALLBACK_KEY, Params, encode_form, jsonp_url};
use crate::core::script;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const JSONP_LOAD_FAILURE: &str = "Failed to load data via JSONP";
pub const EMPTY_ACTION: &str = "action must not be empty";

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    callbacks: Arc<CallbackRegistry>,
}

impl Dispatcher {
    pub fn new(config: ClientConfig) -> Self {
        let transport = HttpTransport::new(config.request_timeout());
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                config,
                transport: Box::new(transport),
                callbacks: CallbackRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Registry of fallback calls still waiting on their callback.
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.inner.callbacks
    }

    pub fn dispatch(&self, action: &str, params: &Params) -> Response {
        if action.is_empty() {
            return Response::failure(EMPTY_ACTION);
        }
        if let Some(shadowed) = params.get(ACTION_KEY) {
            warn!(action, %shadowed, "ignoring action parameter; explicit action wins");
        }

        let err = match self.primary(action, params) {
            Ok(value) => return Response::new(value),
            Err(err) => err,
        };
        warn!(action, error = %err, "primary request failed");

        match self.inner.config.fallback() {
            FallbackMode::Jsonp => self.fallback(action, params),
            FallbackMode::Disabled => Response::failure(format!("Request failed: {err}")),
        }
    }

    fn primary(&self, action: &str, params: &Params) -> Result<Value, Error> {
        let endpoint = self.inner.config.endpoint();
        let body = encode_form(action, params);
        debug!(action, "sending primary request");
        let text = self.inner.transport.post_form(endpoint, &body)?;
        serde_json::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Protocol)
                .with_message("invalid response json")
                .with_url(endpoint.as_str())
                .with_source(err)
        })
    }

    fn fallback(&self, action: &str, params: &Params) -> Response {
        let callbacks = &self.inner.callbacks;
        let pending = callbacks.register();
        let token = pending.token().to_string();
        if params.get(CALLBACK_KEY).is_some() {
            warn!(action, token = %token, "ignoring callback parameter; generated token wins");
        }
        let url = jsonp_url(self.inner.config.endpoint(), action, &token, params);
        debug!(action, token = %token, "sending fallback request");

        match self.inner.transport.load_script(&url) {
            Ok(body) => match script::execute(&body, callbacks) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(action, token = %token, "fallback script invoked an unknown callback")
                }
                Err(err) => {
                    warn!(action, token = %token, error = %err, "fallback script was not usable")
                }
            },
            Err(err) => {
                warn!(action, token = %token, error = %err, "fallback request failed");
                callbacks.settle(&token, Response::failure(JSONP_LOAD_FAILURE).into_value());
            }
        }

        match pending.wait(self.inner.config.fallback_timeout()) {
            Some(value) => Response::new(value),
            None => {
                warn!(action, token = %token, "fallback callback timed out");
                Response::failure(JSONP_LOAD_FAILURE)
            }
        }
    }
}
