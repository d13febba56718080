//! `platsec-types` – shared vocabulary for the platsec workspace.
//!
//! Defines how resources are identified and stored ([`ResourceKey`],
//! [`Metadata`], [`Resource`]), the [`ResourceSpec`] trait that ties a Rust
//! type to a resource type name, the published [`SecurityStateSpec`], and the
//! workspace-wide [`PlatError`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace holding resources that describe the running host.
pub const NAMESPACE_RUNTIME: &str = "runtime";

/// Resource type of the published [`SecurityStateSpec`].
pub const SECURITY_STATE_TYPE: &str = "SecurityStates.runtime.platsec.dev";

/// The singleton id of the security state resource.
pub const SECURITY_STATE_ID: &str = "securitystate";

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Fully-qualified identity of a resource: `(namespace, type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub resource_type: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(
        namespace: impl Into<String>,
        resource_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Key of the `T` resource named `id` in `namespace`.
    pub fn of<T: ResourceSpec>(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(namespace, T::TYPE, id)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.resource_type, self.id)
    }
}

/// A Rust type that can be stored as the spec of a resource.
///
/// `Default` supplies the value a resource starts from when it is created
/// through a modify call.
pub trait ResourceSpec: Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Resource type name, e.g. `"SecurityStates.runtime.platsec.dev"`.
    const TYPE: &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Stored envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Bookkeeping attached to every stored resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub namespace: String,
    pub resource_type: String,
    pub id: String,
    /// Starts at 1 and is bumped only when the spec actually changes.
    pub version: u64,
    /// Name of the controller that last committed the resource.
    pub owner: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Metadata {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.namespace, &self.resource_type, &self.id)
    }
}

/// A resource snapshot: metadata plus the untyped spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub metadata: Metadata,
    pub spec: serde_json::Value,
}

impl Resource {
    /// Decode the spec as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PlatError::Codec`] when the resource is not of type
    /// `T::TYPE` or the stored value does not decode.
    pub fn typed_spec<T: ResourceSpec>(&self) -> Result<T, PlatError> {
        if self.metadata.resource_type != T::TYPE {
            return Err(PlatError::Codec(format!(
                "resource {} is not of type {}",
                self.metadata.key(),
                T::TYPE
            )));
        }
        serde_json::from_value(self.spec.clone())
            .map_err(|e| PlatError::Codec(format!("decode {}: {e}", self.metadata.key())))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SecurityState
// ─────────────────────────────────────────────────────────────────────────────

/// Security posture of the host, published once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStateSpec {
    /// `true` iff firmware reports secure boot enabled and not in setup mode.
    #[serde(default)]
    pub secure_boot: bool,
    /// Colon-separated upper-case SHA-256 of the PCR signing key's DER bytes.
    /// Empty when no key is configured.
    #[serde(default)]
    pub pcr_signing_key_fingerprint: String,
}

impl ResourceSpec for SecurityStateSpec {
    const TYPE: &'static str = SECURITY_STATE_TYPE;
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning runtime contract violations, resource codec
/// failures, and controller failures.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum PlatError {
    #[error("Output Conflict: {resource_type} is already owned by {owner}")]
    OutputConflict { resource_type: String, owner: String },

    #[error("Duplicate Controller: {0}")]
    DuplicateController(String),

    #[error("Not Owner: controller {controller} does not declare output {resource_type}")]
    NotOwner {
        controller: String,
        resource_type: String,
    },

    #[error("Resource Codec Error: {0}")]
    Codec(String),

    #[error("Signing Key Error: {0}")]
    SigningKey(String),

    #[error("Controller {controller} failed: {details}")]
    ControllerFailed { controller: String, details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(resource_type: &str, spec: serde_json::Value) -> Resource {
        let now = Utc::now();
        Resource {
            metadata: Metadata {
                namespace: NAMESPACE_RUNTIME.to_string(),
                resource_type: resource_type.to_string(),
                id: SECURITY_STATE_ID.to_string(),
                version: 1,
                owner: "test".to_string(),
                created: now,
                updated: now,
            },
            spec,
        }
    }

    #[test]
    fn security_state_uses_camel_case_field_names() {
        let spec = SecurityStateSpec {
            secure_boot: true,
            pcr_signing_key_fingerprint: "AB:CD".to_string(),
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["secureBoot"], serde_json::json!(true));
        assert_eq!(json["pcrSigningKeyFingerprint"], serde_json::json!("AB:CD"));
    }

    #[test]
    fn security_state_default_is_insecure_and_empty() {
        let spec = SecurityStateSpec::default();
        assert!(!spec.secure_boot);
        assert!(spec.pcr_signing_key_fingerprint.is_empty());
    }

    #[test]
    fn missing_fields_decode_to_defaults() {
        let spec: SecurityStateSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec, SecurityStateSpec::default());
    }

    #[test]
    fn resource_key_display() {
        let key = ResourceKey::of::<SecurityStateSpec>(NAMESPACE_RUNTIME, SECURITY_STATE_ID);
        assert_eq!(
            key.to_string(),
            "runtime/SecurityStates.runtime.platsec.dev/securitystate"
        );
    }

    #[test]
    fn typed_spec_decodes_matching_type() {
        let r = resource(
            SECURITY_STATE_TYPE,
            serde_json::json!({ "secureBoot": true, "pcrSigningKeyFingerprint": "" }),
        );
        let spec: SecurityStateSpec = r.typed_spec().unwrap();
        assert!(spec.secure_boot);
        assert_eq!(r.metadata.key().id, SECURITY_STATE_ID);
    }

    #[test]
    fn typed_spec_rejects_other_type() {
        let r = resource("Other.runtime.platsec.dev", serde_json::json!({}));
        assert!(matches!(
            r.typed_spec::<SecurityStateSpec>(),
            Err(PlatError::Codec(_))
        ));
    }

    #[test]
    fn plat_error_display() {
        let err = PlatError::OutputConflict {
            resource_type: SECURITY_STATE_TYPE.to_string(),
            owner: "runtime.SecurityStateController".to_string(),
        };
        assert!(err.to_string().contains("Output Conflict"));
        assert!(err.to_string().contains("runtime.SecurityStateController"));
    }
}
