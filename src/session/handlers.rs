//! Inbound request handlers.
//!
//! Capability layers register a [`Handler`] per action name. Requests from
//! the parent invoke the handler and discard its result. Requests from the
//! child may be answered: a handler that returns `Some` produces a reply
//! under the child's request ID.
//!
//! # Example
//!
//! ```ignore
//! use frame_bridge::{Arity, Handler, HandlerReply};
//!
//! session.register_handler(
//!     "themeChange",
//!     Handler::new(|args| {
//!         tracing::info!(theme = ?args.first(), "Theme changed");
//!         None
//!     })
//!     .with_arity(Arity::Exact(1)),
//! );
//!
//! session.on("getVersion", |_| Some(HandlerReply::from("1.0.0")));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{trace, warn};

use crate::transport::PeerRole;

// ============================================================================
// Types
// ============================================================================

/// Boxed handler function.
type HandlerFn = Arc<dyn Fn(&[Value]) -> Option<HandlerReply> + Send + Sync>;

// ============================================================================
// Arity
// ============================================================================

/// Number of arguments a handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Arity {
    /// Any number of arguments.
    #[default]
    Any,
    /// Exactly `n` arguments.
    Exact(usize),
    /// At least `n` arguments.
    AtLeast(usize),
}

impl Arity {
    /// Returns `true` if a call with `count` arguments is acceptable.
    #[inline]
    #[must_use]
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(n) => count == n,
            Self::AtLeast(n) => count >= n,
        }
    }
}

// ============================================================================
// HandlerReply
// ============================================================================

/// Value a handler hands back to a child requester.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerReply {
    /// A single reply argument.
    Value(Value),
    /// Several reply arguments, sent in order.
    Values(Vec<Value>),
}

impl HandlerReply {
    /// Converts the reply into response arguments.
    #[must_use]
    pub fn into_args(self) -> Vec<Value> {
        match self {
            Self::Value(value) => vec![value],
            Self::Values(values) => values,
        }
    }
}

impl From<Value> for HandlerReply {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Vec<Value>> for HandlerReply {
    fn from(values: Vec<Value>) -> Self {
        Self::Values(values)
    }
}

impl From<bool> for HandlerReply {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<&str> for HandlerReply {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_string()))
    }
}

// ============================================================================
// Handler
// ============================================================================

/// A registered action handler.
#[derive(Clone)]
pub struct Handler {
    func: HandlerFn,
    arity: Arity,
}

impl Handler {
    /// Wraps a closure accepting any number of arguments.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[Value]) -> Option<HandlerReply> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            arity: Arity::Any,
        }
    }

    /// Restricts the accepted argument count.
    #[inline]
    #[must_use]
    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    /// Returns the accepted argument count.
    #[inline]
    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Invokes the handler if `args` satisfies its arity.
    pub(crate) fn invoke(&self, name: &str, args: &[Value]) -> Option<HandlerReply> {
        if !self.arity.accepts(args.len()) {
            warn!(
                func = %name,
                expected = ?self.arity,
                actual = args.len(),
                "Handler called with wrong number of arguments"
            );
            return None;
        }

        trace!(func = %name, args = args.len(), "Invoking handler");
        (self.func)(args)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Action name → handler tables.
///
/// Child-scoped handlers shadow shared ones for child requests and are
/// invisible to the parent.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: FxHashMap<String, Handler>,
    child_handlers: FxHashMap<String, Handler>,
}

impl HandlerRegistry {
    /// Registers a handler reachable from either peer. Last one wins.
    pub fn insert(&mut self, name: impl Into<String>, handler: Handler) -> Option<Handler> {
        self.handlers.insert(name.into(), handler)
    }

    /// Registers a handler reachable only from the child.
    pub fn insert_child(&mut self, name: impl Into<String>, handler: Handler) -> Option<Handler> {
        self.child_handlers.insert(name.into(), handler)
    }

    /// Removes a shared handler.
    pub fn remove(&mut self, name: &str) -> Option<Handler> {
        self.handlers.remove(name)
    }

    /// Removes a child-scoped handler.
    pub fn remove_child(&mut self, name: &str) -> Option<Handler> {
        self.child_handlers.remove(name)
    }

    /// Finds the handler for a request from `from`.
    #[must_use]
    pub fn lookup(&self, name: &str, from: PeerRole) -> Option<Handler> {
        let child_scoped = match from {
            PeerRole::Child => self.child_handlers.get(name),
            PeerRole::Parent => None,
        };

        child_scoped.or_else(|| self.handlers.get(name)).cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arity() {
        assert!(Arity::Any.accepts(0));
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(1));
        assert!(Arity::AtLeast(1).accepts(3));
        assert!(!Arity::AtLeast(1).accepts(0));
    }

    #[test]
    fn test_wrong_arity_is_not_invoked() {
        let handler = Handler::new(|_| Some(HandlerReply::from(true))).with_arity(Arity::Exact(1));

        assert_eq!(handler.invoke("x", &[]), None);
        assert_eq!(handler.invoke("x", &[json!(1)]), Some(HandlerReply::from(true)));
    }

    #[test]
    fn test_child_handler_shadows_shared() {
        let mut registry = HandlerRegistry::default();
        registry.insert("initialize", Handler::new(|_| Some("shared".into())));
        registry.insert_child("initialize", Handler::new(|_| Some("child".into())));

        let from_child = registry
            .lookup("initialize", PeerRole::Child)
            .and_then(|h| h.invoke("initialize", &[]));
        let from_parent = registry
            .lookup("initialize", PeerRole::Parent)
            .and_then(|h| h.invoke("initialize", &[]));

        assert_eq!(from_child, Some(HandlerReply::from("child")));
        assert_eq!(from_parent, Some(HandlerReply::from("shared")));
    }

    #[test]
    fn test_child_handler_invisible_to_parent() {
        let mut registry = HandlerRegistry::default();
        registry.insert_child("navigateCrossDomain", Handler::new(|_| Some(false.into())));

        assert!(registry.lookup("navigateCrossDomain", PeerRole::Parent).is_none());
        assert!(registry.lookup("navigateCrossDomain", PeerRole::Child).is_some());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = HandlerRegistry::default();
        registry.insert("a", Handler::new(|_| Some(json!(1).into())));
        let previous = registry.insert("a", Handler::new(|_| Some(json!(2).into())));

        assert!(previous.is_some());
        let reply = registry
            .lookup("a", PeerRole::Parent)
            .and_then(|h| h.invoke("a", &[]));
        assert_eq!(reply, Some(HandlerReply::Value(json!(2))));
    }

    #[test]
    fn test_reply_into_args() {
        assert_eq!(HandlerReply::from(json!("x")).into_args(), vec![json!("x")]);
        assert_eq!(
            HandlerReply::from(vec![json!(1), json!(2)]).into_args(),
            vec![json!(1), json!(2)]
        );
    }
}
