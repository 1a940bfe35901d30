use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::notification::Identity as NotificationIdentity;

/// `(namespace, name)` identity. `Integration` is cluster-scoped in this
/// revision, so its `namespace` is always `None`; `Notification` reuses the
/// same alias with `Some`.
pub type Identity = NotificationIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationCredentials {
    #[serde(default)]
    pub secret_ref: Option<SecretReference>,
}

/// `spec.webhook`: the generic outbound driver, also used for the built-in
/// Alertmanager *validator* path (as opposed to the separate `alertmanager`
/// integration *kind* in [`IntegrationSpec`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSpec {
    pub url: String,
    pub verb: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub validator: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSpec {
    #[serde(default)]
    pub credentials: IntegrationCredentials,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub webhook: WebhookSpec,
}

impl IntegrationSpec {
    /// Whether this manifest asks for secret-backed credential expansion:
    /// both `credentials` and `credentials.secretRef` must be populated.
    pub fn requests_credentials(&self) -> bool {
        self.credentials.secret_ref.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// The declarative `Integration` object: where to send, with credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub name: String,
    pub spec: IntegrationSpec,
    #[serde(default)]
    pub status: IntegrationStatus,
}

impl Integration {
    pub fn identity(&self) -> Identity {
        (None, self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_credentials_requires_secret_ref() {
        let mut spec = IntegrationSpec {
            type_: "webhook".into(),
            ..Default::default()
        };
        assert!(!spec.requests_credentials());

        spec.credentials.secret_ref = Some(SecretReference {
            name: "creds".into(),
            namespace: "default".into(),
        });
        assert!(spec.requests_credentials());
    }
}
