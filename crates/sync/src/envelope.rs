//! Response envelope normalization.
//!
//! List endpoints have been observed to answer in three shapes, depending on
//! which layer wrapped the platform's body:
//!
//! - nested: `{"data": {"data": [...], "paging": {...}}}`
//! - flat: `{"data": [...], "paging": {...}}`
//! - bare: `[...]`
//!
//! [`Envelope::parse`] classifies a body into one of these, or `Unknown`.
//! Each known shape has its own normalizer into a [`Page`]; unknown shapes
//! normalize to nothing and the caller records a warning.

use serde_json::Value;

/// A classified response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// `{"data": {"data": [...], "paging": ...}}`
    Nested { items: Vec<Value>, paging: Value },
    /// `{"data": [...], "paging": ...}`
    Flat { items: Vec<Value>, paging: Value },
    /// `[...]`
    Bare(Vec<Value>),
    /// Anything else. Holds a short description of what arrived.
    Unknown(String),
}

/// One normalized page of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Continuation cursor for the next request, if the server sent one.
    pub after: Option<String>,
}

impl Envelope {
    /// Classify a response body.
    #[must_use]
    pub fn parse(body: Value) -> Self {
        match body {
            Value::Array(items) => Self::Bare(items),
            Value::Object(mut outer) => match outer.remove("data") {
                Some(Value::Array(items)) => Self::Flat {
                    items,
                    paging: outer.remove("paging").unwrap_or(Value::Null),
                },
                Some(Value::Object(mut inner)) => match inner.remove("data") {
                    Some(Value::Array(items)) => Self::Nested {
                        items,
                        paging: inner.remove("paging").unwrap_or(Value::Null),
                    },
                    Some(other) => Self::Unknown(format!("data.data is {}", kind(&other))),
                    None => Self::Unknown("data object without data array".to_string()),
                },
                Some(other) => Self::Unknown(format!("data is {}", kind(&other))),
                None => Self::Unknown("object without data field".to_string()),
            },
            other => Self::Unknown(format!("body is {}", kind(&other))),
        }
    }

    /// Short name of the shape, for logging.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Nested { .. } => "nested",
            Self::Flat { .. } => "flat",
            Self::Bare(_) => "bare",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Normalize into a page. `None` for unknown shapes.
    #[must_use]
    pub fn into_page(self) -> Option<Page> {
        match self {
            Self::Nested { items, paging } | Self::Flat { items, paging } => Some(Page {
                items,
                after: after_cursor(&paging),
            }),
            Self::Bare(items) => Some(Page { items, after: None }),
            Self::Unknown(_) => None,
        }
    }
}

fn after_cursor(paging: &Value) -> Option<String> {
    paging
        .get("cursors")
        .and_then(|cursors| cursors.get("after"))
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string)
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_nested_envelope() {
        let envelope = Envelope::parse(json!({
            "data": {
                "data": [{"id": "1"}],
                "paging": {"cursors": {"after": "abc"}}
            }
        }));
        assert_eq!(envelope.shape(), "nested");

        let page = envelope.into_page().unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.after.as_deref(), Some("abc"));
    }

    #[test]
    fn test_flat_envelope() {
        let page = Envelope::parse(json!({
            "data": [{"id": "1"}, {"id": "2"}],
            "paging": {"cursors": {"before": "x", "after": "y"}}
        }))
        .into_page()
        .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.after.as_deref(), Some("y"));
    }

    #[test]
    fn test_flat_envelope_without_paging() {
        let page = Envelope::parse(json!({"data": []})).into_page().unwrap();
        assert!(page.items.is_empty());
        assert!(page.after.is_none());
    }

    #[test]
    fn test_bare_envelope_has_no_cursor() {
        let envelope = Envelope::parse(json!([{"id": "1"}]));
        assert_eq!(envelope.shape(), "bare");
        assert!(envelope.into_page().unwrap().after.is_none());
    }

    #[test]
    fn test_unknown_envelopes() {
        for body in [
            json!({"results": []}),
            json!({"data": "oops"}),
            json!({"data": {"items": []}}),
            json!("text"),
            Value::Null,
        ] {
            let envelope = Envelope::parse(body);
            assert!(matches!(envelope, Envelope::Unknown(_)));
            assert!(envelope.into_page().is_none());
        }
    }

    #[test]
    fn test_empty_cursor_is_no_cursor() {
        let page = Envelope::parse(json!({"data": [{}], "paging": {"cursors": {"after": ""}}}))
            .into_page()
            .unwrap();
        assert!(page.after.is_none());
    }
}
