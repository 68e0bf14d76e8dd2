//! Request and Response message types.
//!
//! Defines the two wire shapes exchanged between peers and the rules for
//! telling them apart.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::RequestId;

// ============================================================================
// Request
// ============================================================================

/// A request addressed to a peer.
///
/// # Format
///
/// ```json
/// { "id": 3, "func": "authentication.authenticate", "args": ["https://..."] }
/// ```
///
/// `id` is present only when the sender expects a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation ID, absent for fire-and-forget events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Action name.
    pub func: String,

    /// Ordered arguments.
    #[serde(default, deserialize_with = "nullable_args")]
    pub args: Vec<Value>,
}

impl Request {
    /// Creates a fire-and-forget request.
    #[inline]
    #[must_use]
    pub fn new(func: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id: None,
            func: func.into(),
            args,
        }
    }

    /// Creates a request that expects a reply under `id`.
    #[inline]
    #[must_use]
    pub fn with_id(id: RequestId, func: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id: Some(id),
            func: func.into(),
            args,
        }
    }

    /// Returns `true` if the sender expects a reply.
    #[inline]
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        self.id.is_some()
    }
}

// ============================================================================
// Response
// ============================================================================

/// A reply to a request.
///
/// # Format
///
/// ```json
/// { "id": 3, "args": [true, "token"], "isPartialResponse": true }
/// ```
///
/// `isPartialResponse` is only written when `true`; more replies follow
/// under the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// ID of the request being answered.
    pub id: RequestId,

    /// Ordered reply values.
    #[serde(default, deserialize_with = "nullable_args")]
    pub args: Vec<Value>,

    /// `true` if more replies follow.
    #[serde(rename = "isPartialResponse", default, skip_serializing_if = "is_false")]
    pub is_partial: bool,
}

impl Response {
    /// Creates a final response.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, args: Vec<Value>) -> Self {
        Self {
            id,
            args,
            is_partial: false,
        }
    }

    /// Creates a response with an explicit partial flag.
    #[inline]
    #[must_use]
    pub fn with_partial(id: RequestId, args: Vec<Value>, is_partial: bool) -> Self {
        Self {
            id,
            args,
            is_partial,
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// Either wire shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A request (has a string `func`).
    Request(Request),
    /// A response (has a numeric `id` and no `func`).
    Response(Response),
}

impl Message {
    /// Classifies and decodes an inbound payload.
    ///
    /// Returns `None` for anything that is not an object of either shape.
    /// Unknown fields are ignored.
    #[must_use]
    pub fn parse(data: &Value) -> Option<Self> {
        let object = data.as_object()?;

        if object.get("func").is_some_and(Value::is_string) {
            return Request::deserialize(data).ok().map(Self::Request);
        }

        if object.get("id").is_some_and(Value::is_u64) {
            return Response::deserialize(data).ok().map(Self::Response);
        }

        None
    }

    /// Decodes a serialized payload, as delivered by a native bridge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if `text` is not JSON.
    pub fn parse_str(text: &str) -> crate::Result<Option<Self>> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::parse(&value))
    }

    /// Returns the correlation ID, if any.
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<RequestId> {
        match self {
            Self::Request(request) => request.id,
            Self::Response(response) => Some(response.id),
        }
    }

    /// Encodes the message as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();

        match self {
            Self::Request(request) => {
                if let Some(id) = request.id {
                    object.insert("id".into(), Value::from(id.as_u64()));
                }
                object.insert("func".into(), Value::String(request.func.clone()));
                object.insert("args".into(), Value::Array(request.args.clone()));
            }
            Self::Response(response) => {
                object.insert("id".into(), Value::from(response.id.as_u64()));
                object.insert("args".into(), Value::Array(response.args.clone()));
                if response.is_partial {
                    object.insert("isPartialResponse".into(), Value::Bool(true));
                }
            }
        }

        Value::Object(object)
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Reads `args`, treating `null` the same as a missing field.
fn nullable_args<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[inline]
fn is_false(value: &bool) -> bool {
    !*value
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request_with_id() {
        let data = json!({ "id": 4, "func": "settings.save", "args": [1, "two"] });
        let Some(Message::Request(request)) = Message::parse(&data) else {
            panic!("expected request");
        };

        assert_eq!(request.id, Some(RequestId::new(4)));
        assert_eq!(request.func, "settings.save");
        assert_eq!(request.args, vec![json!(1), json!("two")]);
        assert!(request.expects_reply());
    }

    #[test]
    fn test_parse_event_without_id_or_args() {
        let data = json!({ "func": "themeChange" });
        let Some(Message::Request(request)) = Message::parse(&data) else {
            panic!("expected request");
        };

        assert_eq!(request.id, None);
        assert!(request.args.is_empty());
    }

    #[test]
    fn test_parse_response_partial_flag() {
        let partial = json!({ "id": 9, "args": ["a"], "isPartialResponse": true });
        let last = json!({ "id": 9, "args": ["b"] });

        let Some(Message::Response(first)) = Message::parse(&partial) else {
            panic!("expected response");
        };
        let Some(Message::Response(second)) = Message::parse(&last) else {
            panic!("expected response");
        };

        assert!(first.is_partial);
        assert!(!second.is_partial);
        assert_eq!(second.args, vec![json!("b")]);
    }

    #[test]
    fn test_parse_tolerates_unknown_fields_and_null_args() {
        let data = json!({ "id": 1, "args": null, "timestamp": 1700000000, "extra": {} });
        let Some(Message::Response(response)) = Message::parse(&data) else {
            panic!("expected response");
        };
        assert!(response.args.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Message::parse(&json!("initialize")), None);
        assert_eq!(Message::parse(&json!([1, 2, 3])), None);
        assert_eq!(Message::parse(&json!({ "id": "seven" })), None);
        assert_eq!(Message::parse(&json!({ "id": -1, "args": [] })), None);
        assert_eq!(Message::parse(&json!({ "func": "x", "args": "nope" })), None);
        assert_eq!(Message::parse(&json!({})), None);
    }

    #[test]
    fn test_to_value_omits_absent_fields() {
        let event = Message::from(Request::new("ping", vec![]));
        assert_eq!(event.to_value(), json!({ "func": "ping", "args": [] }));

        let response = Message::from(Response::new(RequestId::new(2), vec![json!(true)]));
        assert_eq!(response.to_value(), json!({ "id": 2, "args": [true] }));
    }

    #[test]
    fn test_to_value_matches_serde() {
        let request = Request::with_id(RequestId::new(5), "initialize", vec![json!("2.0.1")]);
        let via_serde = serde_json::to_value(&request).expect("serialize");
        assert_eq!(Message::from(request).to_value(), via_serde);
    }

    #[test]
    fn test_parse_str() {
        let parsed = Message::parse_str(r#"{"id":0,"args":["content","android"]}"#)
            .expect("valid json");
        assert_eq!(parsed.and_then(|m| m.id()), Some(RequestId::new(0)));

        assert!(Message::parse_str("{not json").is_err());
    }
}
