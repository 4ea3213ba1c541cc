//! Credential exchange against a v2.0 identity service.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use posthaste_core::{Credentials, IdentityScheme, TransferConfig};

use crate::error::AuthError;
use crate::USER_AGENT;

/// A token and the storage endpoint it is valid for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub token: String,
    pub endpoint: String,
}

/// Exchanges credentials for a [`Grant`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<Grant, AuthError>;
}

/// HTTP authenticator: `POST {auth_url}/tokens`.
pub struct IdentityClient {
    http: reqwest::Client,
    credentials: Credentials,
}

impl IdentityClient {
    /// Create a client for the given credentials.
    pub fn new(credentials: Credentials, config: &TransferConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { http, credentials })
    }

    fn tokens_url(&self) -> String {
        format!("{}/tokens", self.credentials.auth_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Authenticator for IdentityClient {
    async fn authenticate(&self) -> Result<Grant, AuthError> {
        let url = self.tokens_url();
        debug!(url = %url, username = %self.credentials.username, "requesting token");

        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&request_body(&self.credentials))
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        parse_grant(&bytes, &self.credentials)
    }
}

/// JSON body for the token request.
pub fn request_body(credentials: &Credentials) -> Value {
    match credentials.identity {
        IdentityScheme::ApiKey => json!({
            "auth": {
                "RAX-KSKEY:apiKeyCredentials": {
                    "username": credentials.username,
                    "apiKey": credentials.secret,
                }
            }
        }),
        IdentityScheme::Password => json!({
            "auth": {
                "passwordCredentials": {
                    "username": credentials.username,
                    "password": credentials.secret,
                }
            }
        }),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogService>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

/// One service in the identity catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogService {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub service_type: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// One regional endpoint of a catalog service.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    pub region: Option<String>,
    #[serde(rename = "publicURL")]
    pub public_url: Option<String>,
    #[serde(rename = "internalURL")]
    pub internal_url: Option<String>,
}

/// Parse a token response and pick the storage endpoint.
pub fn parse_grant(body: &[u8], credentials: &Credentials) -> Result<Grant, AuthError> {
    let response: TokenResponse =
        serde_json::from_slice(body).map_err(|e| AuthError::Malformed {
            message: e.to_string(),
        })?;

    let endpoint = select_endpoint(&response.access.service_catalog, credentials).ok_or_else(
        || AuthError::EndpointNotFound {
            service: credentials
                .service
                .service_name
                .clone()
                .unwrap_or_else(|| credentials.service.service_type.clone()),
            region: credentials.region.clone(),
            interface: credentials.interface().to_string(),
        },
    )?;

    Ok(Grant {
        token: response.access.token.id,
        endpoint,
    })
}

/// Find the storage endpoint for the credentials' region and interface.
///
/// Regions compare case-insensitively.
pub fn select_endpoint(catalog: &[CatalogService], credentials: &Credentials) -> Option<String> {
    catalog
        .iter()
        .filter(|service| {
            credentials
                .service
                .matches(service.name.as_deref(), service.service_type.as_deref())
        })
        .flat_map(|service| service.endpoints.iter())
        .filter(|endpoint| {
            endpoint
                .region
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case(&credentials.region))
        })
        .find_map(|endpoint| {
            if credentials.internal {
                endpoint.internal_url.clone()
            } else {
                endpoint.public_url.clone()
            }
        })
}
