//! Purpose: Hold request parameters and encode them for both wire transports.
//! Exports: `Params`, `param_text`, `encode_form`, `jsonp_url`, reserved key names.
//! Role: Single source of the action-merge rule shared by POST and JSONP paths.
//! Invariants: The explicit action always wins; a caller `action` field is never sent.
//! Invariants: The fallback `callback` token always wins over a caller `callback` field.
//! Invariants: Scalars encode as plain text; arrays, objects, and null encode as JSON text.

use crate::core::error::{Error, ErrorKind};
use serde_json::{Map, Value};
use url::Url;
use url::form_urlencoded;

pub const ACTION_KEY: &str = "action";
pub const CALLBACK_KEY: &str = "callback";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    fields: Map<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a field, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Copies every field of `other` over this map; later writes win.
    pub fn extend(&mut self, other: &Params) {
        for (key, value) in &other.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn from_object(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::new(ErrorKind::Usage).with_message(format!(
                "parameters must be a JSON object, got {}",
                kind_name(&other)
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    fn wire_fields(&self, reserved: &[&str]) -> impl Iterator<Item = (&str, String)> {
        self.fields
            .iter()
            .filter(move |(key, _)| !reserved.contains(&key.as_str()))
            .map(|(key, value)| (key.as_str(), param_text(value)))
    }
}

impl From<Map<String, Value>> for Params {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Text form of a parameter value as it appears on the wire.
pub fn param_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        structured => structured.to_string(),
    }
}

/// Builds the `application/x-www-form-urlencoded` body for the primary POST.
pub fn encode_form(action: &str, params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.append_pair(ACTION_KEY, action);
    for (key, value) in params.wire_fields(&[ACTION_KEY]) {
        serializer.append_pair(key, &value);
    }
    serializer.finish()
}

/// Builds the fallback GET url: `action`, then `callback`, then caller fields.
pub fn jsonp_url(endpoint: &Url, action: &str, callback: &str, params: &Params) -> Url {
    let mut url = endpoint.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair(ACTION_KEY, action);
        pairs.append_pair(CALLBACK_KEY, callback);
        for (key, value) in params.wire_fields(&[ACTION_KEY, CALLBACK_KEY]) {
            pairs.append_pair(key, &value);
        }
    }
    url
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
