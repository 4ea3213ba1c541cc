//! Identity credentials and storage endpoint selection.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identity service used when no auth URL is configured.
pub const DEFAULT_AUTH_URL: &str = "https://identity.api.rackspacecloud.com/v2.0";

/// How the secret is presented to the identity service.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityScheme {
    /// Rackspace API key credentials.
    #[default]
    #[serde(alias = "rackspace")]
    #[strum(to_string = "api-key", serialize = "rackspace")]
    ApiKey,
    /// Keystone username/password credentials.
    #[serde(alias = "keystone")]
    #[strum(to_string = "password", serialize = "keystone")]
    Password,
}

/// Which catalog service provides object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSelector {
    /// Catalog service type, matched when no name is given.
    pub service_type: String,
    /// Catalog service name; when set it must match exactly.
    pub service_name: Option<String>,
}

impl Default for ServiceSelector {
    fn default() -> Self {
        Self {
            service_type: "object-store".to_string(),
            service_name: None,
        }
    }
}

impl ServiceSelector {
    /// Whether a catalog entry with this name and type is the storage service.
    pub fn matches(&self, name: Option<&str>, service_type: Option<&str>) -> bool {
        match &self.service_name {
            Some(wanted) => name == Some(wanted.as_str()),
            None => service_type == Some(self.service_type.as_str()),
        }
    }
}

/// Credentials exchanged for a token. Immutable for the life of a job.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub identity: IdentityScheme,
    pub username: String,
    /// API key or password, depending on `identity`.
    pub secret: String,
    /// Identity endpoint; `/tokens` is appended for the exchange.
    pub auth_url: String,
    pub region: String,
    /// Use the internal (service network) endpoint instead of the public one.
    pub internal: bool,
    pub service: ServiceSelector,
}

impl Credentials {
    /// Create credentials for the default identity service.
    pub fn new(
        identity: IdentityScheme,
        username: impl Into<String>,
        secret: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            username: username.into(),
            secret: secret.into(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            region: region.into(),
            internal: false,
            service: ServiceSelector::default(),
        }
    }

    /// Use a different identity endpoint.
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    /// Select the internal endpoint.
    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    /// Override the storage service selector.
    pub fn with_service(mut self, service: ServiceSelector) -> Self {
        self.service = service;
        self
    }

    /// Name of the endpoint interface to pick from the catalog.
    pub fn interface(&self) -> &'static str {
        if self.internal { "internal" } else { "public" }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("region", &self.region)
            .field("internal", &self.internal)
            .field("service", &self.service)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_aliases() {
        assert_eq!("rackspace".parse::<IdentityScheme>().unwrap(), IdentityScheme::ApiKey);
        assert_eq!("keystone".parse::<IdentityScheme>().unwrap(), IdentityScheme::Password);
        assert_eq!("password".parse::<IdentityScheme>().unwrap(), IdentityScheme::Password);
        assert!("ldap".parse::<IdentityScheme>().is_err());
    }

    #[test]
    fn test_service_selector() {
        let by_type = ServiceSelector::default();
        assert!(by_type.matches(Some("swift"), Some("object-store")));
        assert!(!by_type.matches(Some("cloudFiles"), Some("rax:object-cdn")));

        let by_name = ServiceSelector {
            service_name: Some("cloudFiles".to_string()),
            ..Default::default()
        };
        assert!(by_name.matches(Some("cloudFiles"), Some("object-store")));
        assert!(!by_name.matches(Some("cloudFilesCDN"), Some("object-store")));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new(IdentityScheme::ApiKey, "alice", "hunter2", "DFW");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert_eq!(creds.interface(), "public");
        assert_eq!(creds.with_internal(true).interface(), "internal");
    }
}
