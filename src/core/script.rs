//! Purpose: Evaluate fallback script bodies that invoke a callback with one JSON argument.
//! Exports: `Invocation`, `parse_invocation`, `execute`.
//! Role: Restricted stand-in for a page script loader; understands `name(<json>)` only.
//! Invariants: Accepted shapes are `name(<json>)` and `name(<json>);` with optional `/**/` prefix.
//! Invariants: A body that does not parse settles nothing.

use crate::core::callback::CallbackRegistry;
use crate::core::error::{Error, ErrorKind};
use serde_json::Value;

const SAFE_PREFIX: &str = "/**/";

#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    pub callee: String,
    pub argument: Value,
}

pub fn parse_invocation(body: &str) -> Result<Invocation, Error> {
    let trimmed = body.trim();
    let trimmed = trimmed.strip_prefix(SAFE_PREFIX).unwrap_or(trimmed).trim_start();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

    let Some(open) = trimmed.find('(') else {
        return Err(script_error("script does not invoke a callback"));
    };
    let callee = trimmed[..open].trim_end();
    if !is_identifier(callee) {
        return Err(script_error("script callee is not an identifier"));
    }
    let Some(args) = trimmed[open + 1..].strip_suffix(')') else {
        return Err(script_error("script invocation is not closed"));
    };
    let argument = serde_json::from_str(args).map_err(|err| {
        Error::new(ErrorKind::Protocol)
            .with_message("script callback argument is not json")
            .with_source(err)
    })?;
    Ok(Invocation {
        callee: callee.to_string(),
        argument,
    })
}

/// Runs `body` against `registry`, returning whether a waiting callback was settled.
pub fn execute(body: &str, registry: &CallbackRegistry) -> Result<bool, Error> {
    let invocation = parse_invocation(body)?;
    Ok(registry.settle(&invocation.callee, invocation.argument))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn script_error(message: &str) -> Error {
    Error::new(ErrorKind::Protocol).with_message(message)
}

#[cfg(test)]
mod tests {
    use super::{execute, parse_invocation};
    use crate::core::callback::CallbackRegistry;
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn parses_plain_invocation() {
        let inv = parse_invocation("jsonpCallback_1_2({\"success\":true,\"id\":42})").expect("inv");
        assert_eq!(inv.callee, "jsonpCallback_1_2");
        assert_eq!(inv.argument, json!({"success": true, "id": 42}));
    }

    #[test]
    fn accepts_semicolon_whitespace_and_safe_prefix() {
        let inv = parse_invocation("  /**/ cb ( [1, 2] ) ;\n").expect("inv");
        assert_eq!(inv.callee, "cb");
        assert_eq!(inv.argument, json!([1, 2]));
    }

    #[test]
    fn scalar_arguments_parse() {
        let inv = parse_invocation("cb(42)").expect("inv");
        assert_eq!(inv.argument, json!(42));
    }

    #[test]
    fn rejects_malformed_bodies() {
        for body in [
            "",
            "{\"success\":true}",
            "<html>moved</html>",
            "alert(1); cb({})",
            "cb({\"a\":1}",
            "1cb({})",
            "cb(undefined)",
        ] {
            let err = parse_invocation(body).expect_err(body);
            assert_eq!(err.kind(), ErrorKind::Protocol, "{body}");
        }
    }

    #[test]
    fn execute_settles_matching_token_only() {
        let registry = CallbackRegistry::new();
        let pending = registry.register();
        let body = format!("{}({{\"success\":true}})", pending.token());

        assert!(!execute("other_token({})", &registry).expect("parse"));
        assert!(registry.is_pending(pending.token()));

        assert!(execute(&body, &registry).expect("parse"));
        assert!(!execute(&body, &registry).expect("parse"));
        assert_eq!(pending.wait(None), Some(json!({"success": true})));
    }
}
