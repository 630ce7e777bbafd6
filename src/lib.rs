//! Purpose: Shared library crate used by the `rapor` CLI and tests.
//! Exports: `api` (dispatcher, transports, entity wrappers) and `core` (params, callbacks, errors).
//! Role: Thin client for a script-hosted gradebook backend.
//! Invariants: `api::Dispatcher::dispatch` always settles with a JSON value, never an error.
//! Invariants: The library reads no environment variables; configuration is explicit.
pub mod api;
pub mod core;
