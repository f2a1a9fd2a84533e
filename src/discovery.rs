use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

/// OpenID Connect discovery document, reduced to the endpoints the login flow uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<Url>,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

impl ProviderMetadata {
    /// Metadata with only the two endpoints the login flow cannot do without.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        authorization_endpoint: Url,
        token_endpoint: Url,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            authorization_endpoint,
            token_endpoint,
            userinfo_endpoint: None,
            end_session_endpoint: None,
            revocation_endpoint: None,
            code_challenge_methods_supported: Vec::new(),
        }
    }

    /// Whether the provider advertises S256 PKCE.
    ///
    /// Providers that omit the field are assumed to support it.
    #[must_use]
    pub fn supports_s256(&self) -> bool {
        self.code_challenge_methods_supported.is_empty()
            || self
                .code_challenge_methods_supported
                .iter()
                .any(|m| m == crate::pkce::CHALLENGE_METHOD)
    }
}

/// `{issuer}/.well-known/openid-configuration`, keeping any realm path on the issuer.
///
/// # Errors
///
/// Returns [`Error::Discovery`] if the issuer cannot be used as a base URL.
pub fn discovery_url(issuer: &Url) -> Result<Url, Error> {
    let mut base = issuer.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(WELL_KNOWN_PATH)
        .map_err(|e| Error::Discovery(format!("{issuer}: {e}")))
}
