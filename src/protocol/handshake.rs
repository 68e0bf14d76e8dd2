//! Handshake exchange.
//!
//! The first request a session sends is `initialize` with the protocol
//! version. The host answers with:
//!
//! ```text
//! [frameContext, hostClientType, runtimeConfigOrVersion?, clientSupportedVersion?]
//! ```
//!
//! Older hosts swap positions 3 and 4, so both are tried as a capability
//! manifest before either is taken as a bare version string.

// ============================================================================
// Imports
// ============================================================================


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::{FrameContext, HostClientType};

// ============================================================================
// Constants
// ============================================================================

/// Action name of the handshake request.
pub const HANDSHAKE_ACTION: &str = "initialize";

/// Protocol version announced in the handshake.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2.0.1";

/// Version assumed when the host does not report one.
pub const DEFAULT_CLIENT_SUPPORTED_VERSION: &str = "2.0.1";

/// API version assigned to manifests synthesized for legacy hosts.
const LEGACY_API_VERSION: u32 = 1;

// ============================================================================
// CapabilityManifest
// ============================================================================

/// Host capability manifest (runtime config).
///
/// Only the envelope is interpreted here; per-capability flags stay in
/// `supports` for capability layers to read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityManifest {
    /// Manifest schema version.
    #[serde(default)]
    pub api_version: u32,

    /// Supported capability namespaces.
    #[serde(default)]
    pub supports: Map<String, Value>,

    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CapabilityManifest {
    /// Manifest derived for hosts that only report a version.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            api_version: LEGACY_API_VERSION,
            ..Self::default()
        }
    }

    /// Returns `true` if the host declares support for `capability`.
    #[inline]
    #[must_use]
    pub fn supports(&self, capability: &str) -> bool {
        self.supports.contains_key(capability)
    }

    /// Tries to read a manifest from a handshake argument.
    ///
    /// Accepts a JSON object or a string containing one.
    #[must_use]
    pub fn from_handshake_arg(value: &Value) -> Option<Self> {
        let parsed;
        let object = match value {
            Value::Object(_) => value,
            Value::String(text) => {
                parsed = serde_json::from_str::<Value>(text).ok()?;
                &parsed
            }
            _ => return None,
        };

        if !object.is_object() {
            return None;
        }

        Self::deserialize(object).ok()
    }
}

// ============================================================================
// HostContext
// ============================================================================

/// Everything learned from the handshake reply.
#[derive(Debug, Clone, PartialEq)]
pub struct HostContext {
    /// Embedding surface, if the host reported one.
    pub frame_context: Option<FrameContext>,
    /// Host client type, if the host reported one.
    pub host_client_type: Option<HostClientType>,
    /// Capability manifest (synthesized for legacy hosts).
    pub manifest: CapabilityManifest,
    /// Protocol version the host supports.
    pub client_supported_version: String,
}

impl HostContext {
    /// Interprets the handshake reply arguments.
    ///
    /// Never fails: missing or unrecognized fields fall back to defaults.
    #[must_use]
    pub fn from_handshake(args: &[Value]) -> Self {
        let frame_context = args
            .first()
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());
        let host_client_type = args
            .get(1)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());

        let runtime_config = args.get(2);
        let mut version = args
            .get(3)
            .and_then(Value::as_str)
            .filter(|candidate| is_version(candidate))
            .unwrap_or(DEFAULT_CLIENT_SUPPORTED_VERSION)
            .to_string();

        let manifest = if let Some(manifest) =
            runtime_config.and_then(CapabilityManifest::from_handshake_arg)
        {
            manifest
        } else {
            // Older hosts put the version third and the manifest fourth.
            if let Some(candidate) = runtime_config.and_then(Value::as_str)
                && is_version(candidate)
            {
                version = candidate.to_string();
            }

            match args.get(3).and_then(CapabilityManifest::from_handshake_arg) {
                Some(manifest) => manifest,
                None => {
                    trace!(version = %version, "No manifest in handshake, deriving legacy manifest");
                    CapabilityManifest::legacy()
                }
            }
        };

        debug!(
            frame_context = ?frame_context,
            host_client_type = ?host_client_type,
            api_version = manifest.api_version,
            version = %version,
            "Parsed handshake reply"
        );

        Self {
            frame_context,
            host_client_type,
            manifest,
            client_supported_version: version,
        }
    }
}

// ============================================================================
// Version Helpers
// ============================================================================

/// Returns `true` if `candidate` is a dot-separated numeric version.
#[inline]
#[must_use]
pub fn is_version(candidate: &str) -> bool {
    parse_version(candidate).is_some()
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    if version.is_empty() {
        return None;
    }
    version
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_reply() {
        let context = HostContext::from_handshake(&[json!("content"), json!("web")]);

        assert_eq!(context.frame_context, Some(FrameContext::Content));
        assert_eq!(context.host_client_type, Some(HostClientType::Web));
        assert_eq!(context.manifest, CapabilityManifest::legacy());
        assert_eq!(context.client_supported_version, DEFAULT_CLIENT_SUPPORTED_VERSION);
    }

    #[test]
    fn test_manifest_then_version() {
        let manifest = r#"{"apiVersion":2,"supports":{"dialog":{}},"hostVersionsInfo":{}}"#;
        let context = HostContext::from_handshake(&[
            json!("settings"),
            json!("desktop"),
            json!(manifest),
            json!("2.3.0"),
        ]);

        assert_eq!(context.manifest.api_version, 2);
        assert!(context.manifest.supports("dialog"));
        assert!(context.manifest.extra.contains_key("hostVersionsInfo"));
        assert_eq!(context.client_supported_version, "2.3.0");
    }

    #[test]
    fn test_version_then_manifest() {
        let manifest = r#"{"apiVersion":3,"supports":{"pages":{}}}"#;
        let context = HostContext::from_handshake(&[
            json!("content"),
            json!("web"),
            json!("1.9.0"),
            json!(manifest),
        ]);

        assert_eq!(context.manifest.api_version, 3);
        assert!(context.manifest.supports("pages"));
        assert_eq!(context.client_supported_version, "1.9.0");
    }

    #[test]
    fn test_version_only_falls_back_to_legacy_manifest() {
        let context =
            HostContext::from_handshake(&[json!("task"), json!("android"), json!("1.6.0")]);

        assert_eq!(context.manifest, CapabilityManifest::legacy());
        assert_eq!(context.client_supported_version, "1.6.0");
    }

    #[test]
    fn test_manifest_object_accepted_directly() {
        let context = HostContext::from_handshake(&[
            json!("content"),
            json!("web"),
            json!({ "apiVersion": 4, "supports": {} }),
        ]);
        assert_eq!(context.manifest.api_version, 4);
    }

    #[test]
    fn test_missing_context_is_tolerated() {
        let context = HostContext::from_handshake(&[]);
        assert_eq!(context.frame_context, None);
        assert_eq!(context.host_client_type, None);
    }

    #[test]
    fn test_non_object_json_is_not_a_manifest() {
        assert_eq!(CapabilityManifest::from_handshake_arg(&json!("2")), None);
        assert_eq!(CapabilityManifest::from_handshake_arg(&json!("null")), None);
        assert_eq!(CapabilityManifest::from_handshake_arg(&json!(5)), None);
    }
}
