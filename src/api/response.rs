use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Untyped backend reply.
///
/// The backend conventionally sends `success` plus `data` or `error`, but nothing here
/// enforces that shape; the helpers only read it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response(Value);

impl Response {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Synthetic `{success: false, error}` value produced on the client side.
    pub fn failure(message: impl Into<String>) -> Self {
        Self(json!({ "success": false, "error": message.into() }))
    }

    /// True only when `success` is literally `true`.
    pub fn is_success(&self) -> bool {
        self.0.get("success").and_then(Value::as_bool) == Some(true)
    }

    /// True only when `success` is literally `false`.
    pub fn is_failure(&self) -> bool {
        self.0.get("success").and_then(Value::as_bool) == Some(false)
    }

    pub fn data(&self) -> Option<&Value> {
        self.0.get("data")
    }

    pub fn error_message(&self) -> Option<&str> {
        let error = self.0.get("error")?;
        error
            .as_str()
            .or_else(|| error.get("message").and_then(Value::as_str))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Response {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl PartialEq<Value> for Response {
    fn eq(&self, other: &Value) -> bool {
        &self.0 == other
    }
}
