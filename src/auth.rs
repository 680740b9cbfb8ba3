//! Identity exchange against a Keystone v2.0 style token endpoint.
//!
//! One POST of a credential document yields a token and a service catalog.
//! The object-store endpoint for the configured region is selected from the
//! catalog and bundled with the token into a [`Session`] that is then shared
//! read-only by every component of the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, AuthMethod};
use crate::error::{HasteError, Result};

/// Catalog `type` of the object storage service.
pub const OBJECT_STORE_TYPE: &str = "object-store";

/// Header carrying the session token on every storage request.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
    pub method: AuthMethod,
    pub tenant: Option<String>,
}

impl From<&AppConfig> for Credentials {
    fn from(config: &AppConfig) -> Self {
        Self {
            username: config.username.clone(),
            secret: config.api_key.clone(),
            method: config.auth_method,
            tenant: config.tenant.clone(),
        }
    }
}

/// Authenticated, region-resolved context for one run.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub endpoint: String,
    pub region: String,
    pub container: Option<String>,
    pub expires: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(token: impl Into<String>, endpoint: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: endpoint.into(),
            region: region.into(),
            container: None,
            expires: None,
        }
    }

    pub fn with_container(mut self, container: Option<String>) -> Self {
        self.container = container;
        self
    }
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Serialize)]
struct AuthBody<'a> {
    #[serde(rename = "RAX-KSKEY:apiKeyCredentials", skip_serializing_if = "Option::is_none")]
    api_key_credentials: Option<ApiKeyCredentials<'a>>,
    #[serde(rename = "passwordCredentials", skip_serializing_if = "Option::is_none")]
    password_credentials: Option<PasswordCredentials<'a>>,
    #[serde(rename = "tenantName", skip_serializing_if = "Option::is_none")]
    tenant_name: Option<&'a str>,
}

#[derive(Serialize)]
struct ApiKeyCredentials<'a> {
    username: &'a str,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    username: &'a str,
    password: &'a str,
}

impl<'a> AuthRequest<'a> {
    fn new(credentials: &'a Credentials) -> Self {
        let (api_key_credentials, password_credentials) = match credentials.method {
            AuthMethod::ApiKey => (
                Some(ApiKeyCredentials {
                    username: &credentials.username,
                    api_key: &credentials.secret,
                }),
                None,
            ),
            AuthMethod::Password => (
                None,
                Some(PasswordCredentials {
                    username: &credentials.username,
                    password: &credentials.secret,
                }),
            ),
        };

        Self {
            auth: AuthBody {
                api_key_credentials,
                password_credentials,
                tenant_name: credentials.tenant.as_deref(),
            },
        }
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
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
    #[serde(default)]
    expires: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    #[serde(default)]
    region: String,
    #[serde(rename = "publicURL", default)]
    public_url: Option<String>,
    #[serde(rename = "internalURL", default)]
    internal_url: Option<String>,
}

/// Exchange credentials for a [`Session`] bound to `region`.
///
/// Not retried: any failure here is fatal for the run.
pub async fn authenticate(
    client: &reqwest::Client,
    identity_url: &str,
    credentials: &Credentials,
    region: &str,
    internal: bool,
) -> Result<Session> {
    debug!(identity_url, username = %credentials.username, "Authenticating");

    let res = client
        .post(identity_url)
        .json(&AuthRequest::new(credentials))
        .send()
        .await
        .map_err(HasteError::AuthTransport)?;

    let status = res.status();
    if !status.is_success() {
        return Err(HasteError::AuthRejected {
            status: status.as_u16(),
        });
    }

    let body = res.text().await.map_err(HasteError::AuthTransport)?;
    let tokens: TokenResponse =
        serde_json::from_str(&body).map_err(|e| HasteError::AuthResponse(e.to_string()))?;

    let endpoint = select_endpoint(&tokens.access.service_catalog, region, internal)?;
    let expires = tokens.access.token.expires.as_deref().and_then(parse_expiry);

    match expires {
        Some(at) if at <= Utc::now() => {
            warn!(expires = %at, "Identity service returned an already expired token")
        }
        Some(at) => debug!(expires = %at, "Token valid until"),
        None => {}
    }

    info!(region, endpoint = %endpoint, "Authenticated");

    Ok(Session {
        token: tokens.access.token.id,
        endpoint,
        region: region.to_string(),
        container: None,
        expires,
    })
}

/// Pick the object-store URL whose region matches exactly.
fn select_endpoint(catalog: &[CatalogEntry], region: &str, internal: bool) -> Result<String> {
    catalog
        .iter()
        .filter(|entry| entry.kind == OBJECT_STORE_TYPE)
        .flat_map(|entry| entry.endpoints.iter())
        .filter(|endpoint| endpoint.region == region)
        .find_map(|endpoint| {
            let url = if internal {
                endpoint.internal_url.as_ref()
            } else {
                endpoint.public_url.as_ref()
            };
            url.filter(|u| !u.is_empty()).cloned()
        })
        .ok_or_else(|| HasteError::RegionNotFound {
            region: region.to_string(),
            interface: if internal { "internalURL" } else { "publicURL" },
        })
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
