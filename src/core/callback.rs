//! Purpose: Token-addressed completion handles for fallback script callbacks.
//! Exports: `CallbackRegistry`, `PendingCallback`, `TOKEN_PREFIX`.
//! Role: Replaces a process-wide callback namespace with a registry owned by the dispatcher.
//! Invariants: Each token settles at most once; later settle attempts are no-ops.
//! Invariants: An entry is removed on first settlement or when its handle drops.
//! Invariants: Tokens combine wall-clock millis with a process-wide monotonic counter.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const TOKEN_PREFIX: &str = "jsonpCallback_";

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
pub struct CallbackRegistry {
    pending: Mutex<HashMap<String, SyncSender<Value>>>,
}

#[derive(Debug)]
pub struct PendingCallback {
    token: String,
    receiver: Receiver<Value>,
    registry: Arc<CallbackRegistry>,
}

impl CallbackRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>) -> PendingCallback {
        let token = next_token();
        let (sender, receiver) = mpsc::sync_channel(1);
        self.lock().insert(token.clone(), sender);
        PendingCallback {
            token,
            receiver,
            registry: Arc::clone(self),
        }
    }

    /// Delivers `value` to the call waiting on `token`.
    ///
    /// Returns `false` when no call is waiting, which includes every attempt after the first.
    pub fn settle(&self, token: &str, value: Value) -> bool {
        let Some(sender) = self.lock().remove(token) else {
            return false;
        };
        sender.try_send(value).is_ok()
    }

    pub fn is_pending(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn release(&self, token: &str) {
        self.lock().remove(token);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SyncSender<Value>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl PendingCallback {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Blocks until the callback settles.
    ///
    /// With no timeout this waits indefinitely. Returns `None` only when the timeout elapses.
    pub fn wait(self, timeout: Option<Duration>) -> Option<Value> {
        match timeout {
            None => self.receiver.recv().ok(),
            Some(timeout) => match self.receiver.recv_timeout(timeout) {
                Ok(value) => Some(value),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
            },
        }
    }
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        self.registry.release(&self.token);
    }
}

fn next_token() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let seq = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    format!("{TOKEN_PREFIX}{millis}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::{CallbackRegistry, TOKEN_PREFIX};
    use serde_json::json;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn settle_delivers_value_once() {
        let registry = CallbackRegistry::new();
        let pending = registry.register();
        let token = pending.token().to_string();

        assert!(registry.settle(&token, json!({"success": true})));
        assert!(!registry.settle(&token, json!({"success": false})));
        assert!(!registry.is_pending(&token));
        assert_eq!(pending.wait(None), Some(json!({"success": true})));
    }

    #[test]
    fn tokens_are_distinct_and_prefixed() {
        let registry = CallbackRegistry::new();
        let first = registry.register();
        let second = registry.register();
        assert_ne!(first.token(), second.token());
        assert!(first.token().starts_with(TOKEN_PREFIX));
        assert_eq!(registry.pending_count(), 2);
    }

    #[test]
    fn dropping_handle_releases_entry() {
        let registry = CallbackRegistry::new();
        let pending = registry.register();
        let token = pending.token().to_string();
        assert!(registry.is_pending(&token));

        drop(pending);
        assert!(!registry.is_pending(&token));
        assert!(!registry.settle(&token, json!(null)));
    }

    #[test]
    fn wait_times_out_and_cleans_up() {
        let registry = CallbackRegistry::new();
        let pending = registry.register();
        assert_eq!(pending.wait(Some(Duration::from_millis(10))), None);
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn settle_from_another_thread() {
        let registry = CallbackRegistry::new();
        let pending = registry.register();
        let token = pending.token().to_string();
        let remote = registry.clone();
        let handle = thread::spawn(move || remote.settle(&token, json!({"id": 42})));

        assert_eq!(
            pending.wait(Some(Duration::from_secs(5))),
            Some(json!({"id": 42}))
        );
        assert!(handle.join().expect("join"));
    }
}
