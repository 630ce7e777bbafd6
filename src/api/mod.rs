//! Purpose: Define the public Rust API boundary for the gradebook client.
//! Exports: Dispatcher, transports, configuration, responses, and entity wrappers.
//! Role: Public surface used by the CLI and integration tests.
//! Invariants: Dispatch results are values, never errors; `Error` covers construction only.

mod config;
mod dispatcher;
mod entity;
mod response;
mod transport;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::params::Params;
pub use config::{ClientConfig, FallbackMode};
pub use dispatcher::{Dispatcher, EMPTY_ACTION, JSONP_LOAD_FAILURE};
pub use entity::{Entity, EntityApi, Lookup, PageRequest, Verb};
pub use response::Response;
pub use transport::{FORM_CONTENT_TYPE, HttpTransport, Transport};
