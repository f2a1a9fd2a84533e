use serde::Deserialize;
use url::Url;

use crate::discovery::ProviderMetadata;
use crate::pkce::{self, Pkce};

/// `OAuth2` client configuration for the storefront's identity provider.
///
/// Required fields are constructor parameters.
///
/// ```rust,ignore
/// use storefront_client::OAuthConfig;
///
/// let config = OAuthConfig::new(
///     "login-app",
///     "com.signusk://oauthredirect".parse()?,
///     "https://idp.example.com/realms/shop".parse()?,
/// )
/// .with_scopes(vec!["openid".into(), "email".into()]);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) redirect_uri: Url,
    pub(crate) issuer: Url,
    pub(crate) scopes: Vec<String>,
}

impl OAuthConfig {
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: Url, issuer: Url) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri,
            issuer,
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
        }
    }

    /// Override the requested scopes (default: `["openid", "profile", "email"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Deep link the provider redirects back to.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Issuer base URL; discovery is resolved relative to it.
    #[must_use]
    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// A prepared authorization request: the URL to open plus the secrets the
/// callback is checked against.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
    pub redirect_uri: Url,
    pkce: Pkce,
}

impl AuthorizationRequest {
    /// Builds a request against the discovered authorization endpoint with a
    /// fresh PKCE pair and `state`.
    #[must_use]
    pub fn new(config: &OAuthConfig, metadata: &ProviderMetadata) -> Self {
        Self::with_pkce(config, metadata, Pkce::generate(), pkce::generate_state())
    }

    /// Builds a request from caller-supplied PKCE material.
    #[must_use]
    pub fn with_pkce(
        config: &OAuthConfig,
        metadata: &ProviderMetadata,
        pkce: Pkce,
        state: String,
    ) -> Self {
        let scope = config.scopes.join(" ");

        let mut url = metadata.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", config.redirect_uri.as_str())
            .append_pair("scope", &scope)
            .append_pair("state", &state)
            .append_pair("code_challenge", pkce.challenge())
            .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);

        Self {
            url,
            state,
            redirect_uri: config.redirect_uri.clone(),
            pkce,
        }
    }

    #[must_use]
    pub fn code_verifier(&self) -> &str {
        self.pkce.verifier()
    }

    #[must_use]
    pub fn code_challenge(&self) -> &str {
        self.pkce.challenge()
    }
}

/// Result of the interactive browser step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Success {
        code: Option<String>,
        state: Option<String>,
    },
    /// The user backed out of the provider's page.
    Cancel,
    /// The browser was closed before the provider redirected back.
    Dismiss,
    Error {
        message: Option<String>,
    },
    /// The user agent reported something it could not classify.
    Unknown,
}

impl AuthorizationOutcome {
    /// Reads the outcome from the redirect the provider sent back.
    #[must_use]
    pub fn from_redirect(url: &Url) -> Self {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut error_description = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        if error.is_some() {
            return Self::Error {
                message: error_description.or(error),
            };
        }
        Self::Success {
            code: code.filter(|c| !c.is_empty()),
            state,
        }
    }
}

/// Token response from the provider's token endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    /// Empty when the provider omitted it; the controller rejects such responses.
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }
}

/// Parameters of an authorization-code exchange.
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    pub client_id: &'a str,
    pub code: &'a str,
    pub code_verifier: &'a str,
    pub redirect_uri: &'a Url,
}

#[cfg(feature = "oauth")]
pub use http::HttpIdentityProvider;

#[cfg(feature = "oauth")]
mod http {
    use url::Url;

    use super::{CodeExchange, TokenResponse};
    use crate::discovery::{self, ProviderMetadata};
    use crate::error::Error;
    use crate::traits::IdentityProvider;

    /// Identity provider gateway speaking OpenID discovery and the `OAuth2`
    /// token endpoint over HTTPS.
    #[derive(Debug, Clone)]
    pub struct HttpIdentityProvider {
        issuer: Url,
        http: reqwest::Client,
    }

    impl HttpIdentityProvider {
        #[must_use]
        pub fn new(issuer: Url) -> Self {
            Self {
                issuer,
                http: reqwest::Client::new(),
            }
        }

        /// Use a custom HTTP client (for connection pool reuse or testing).
        #[must_use]
        pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
            self.http = client;
            self
        }

        /// Returns the response on 2xx, otherwise a description of the failure.
        async fn ensure_success(
            response: reqwest::Response,
            operation: &'static str,
        ) -> Result<reqwest::Response, String> {
            if response.status().is_success() {
                return Ok(response);
            }
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(format!("{operation} returned {status}: {body}"))
        }
    }

    impl IdentityProvider for HttpIdentityProvider {
        async fn discover(&self) -> Result<ProviderMetadata, Error> {
            let url = discovery::discovery_url(&self.issuer)?;
            let response = self.http.get(url).send().await?;
            let response = Self::ensure_success(response, "discovery")
                .await
                .map_err(Error::Discovery)?;
            response
                .json::<ProviderMetadata>()
                .await
                .map_err(|e| Error::Discovery(e.to_string()))
        }

        async fn exchange_code(
            &self,
            metadata: &ProviderMetadata,
            exchange: &CodeExchange<'_>,
        ) -> Result<TokenResponse, Error> {
            let params = [
                ("grant_type", "authorization_code"),
                ("client_id", exchange.client_id),
                ("code", exchange.code),
                ("redirect_uri", exchange.redirect_uri.as_str()),
                ("code_verifier", exchange.code_verifier),
            ];

            let response = self
                .http
                .post(metadata.token_endpoint.clone())
                .form(&params)
                .send()
                .await
                .map_err(|e| Error::TokenExchangeFailed(e.to_string()))?;

            let response = Self::ensure_success(response, "token exchange")
                .await
                .map_err(Error::TokenExchangeFailed)?;
            response
                .json::<TokenResponse>()
                .await
                .map_err(|e| Error::TokenExchangeFailed(e.to_string()))
        }
    }
}
