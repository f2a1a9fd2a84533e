use std::path::PathBuf;

use url::Url;

use crate::error::Error;
use crate::oauth::OAuthConfig;

const DEFAULT_CATALOG_URL: &str = "http://localhost:8000/graphql/";
const DEFAULT_PAGE_SIZE: u32 = 10;

/// Everything a storefront client needs to start: identity provider settings,
/// catalog endpoint and persistence location.
///
/// Required fields are constructor parameters. Use
/// [`from_env()`](StorefrontConfig::from_env) for convention-based setup.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct StorefrontConfig {
    pub oauth: OAuthConfig,
    pub catalog_endpoint: Url,
    pub page_size: u32,
    /// Token file for [`FileTokenStore`](crate::FileTokenStore); `None` keeps
    /// tokens in memory.
    pub token_file: Option<PathBuf>,
}

impl StorefrontConfig {
    /// # Errors
    ///
    /// Never fails for the built-in default catalog URL; the `Result` is kept
    /// for symmetry with [`from_env`](Self::from_env).
    pub fn new(oauth: OAuthConfig) -> Result<Self, Error> {
        let catalog_endpoint = DEFAULT_CATALOG_URL
            .parse()
            .map_err(|e| Error::Config(format!("default catalog URL: {e}")))?;
        Ok(Self {
            oauth,
            catalog_endpoint,
            page_size: DEFAULT_PAGE_SIZE,
            token_file: None,
        })
    }

    #[must_use]
    pub fn with_catalog_endpoint(mut self, endpoint: Url) -> Self {
        self.catalog_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `STOREFRONT_CLIENT_ID`: OAuth2 client ID
    /// - `STOREFRONT_REDIRECT_URI`: OAuth2 redirect URI (must be a valid URL)
    /// - `STOREFRONT_ISSUER_URL`: identity provider issuer, e.g. a Keycloak realm URL
    ///
    /// # Optional env vars
    /// - `STOREFRONT_SCOPES`: Comma-separated OAuth2 scopes
    /// - `STOREFRONT_CATALOG_URL`: GraphQL endpoint of the catalog
    /// - `STOREFRONT_PAGE_SIZE`: Products per page (default 10)
    /// - `STOREFRONT_TOKEN_FILE`: Where tokens are persisted
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required variables are missing or values are invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is required")))
        };
        let parse_url = |key: &str, value: &str| {
            value
                .parse::<Url>()
                .map_err(|e| Error::Config(format!("{key}: {e}")))
        };

        let client_id = required("STOREFRONT_CLIENT_ID")?;
        let redirect_uri = parse_url(
            "STOREFRONT_REDIRECT_URI",
            &required("STOREFRONT_REDIRECT_URI")?,
        )?;
        let issuer = parse_url("STOREFRONT_ISSUER_URL", &required("STOREFRONT_ISSUER_URL")?)?;

        let mut oauth = OAuthConfig::new(client_id, redirect_uri, issuer);
        if let Some(scopes) = lookup("STOREFRONT_SCOPES") {
            let scopes: Vec<String> = scopes
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if scopes.is_empty() {
                return Err(Error::Config("STOREFRONT_SCOPES is empty".into()));
            }
            oauth = oauth.with_scopes(scopes);
        }

        let mut config = Self::new(oauth)?;
        if let Some(url) = lookup("STOREFRONT_CATALOG_URL") {
            config = config.with_catalog_endpoint(parse_url("STOREFRONT_CATALOG_URL", &url)?);
        }
        if let Some(size) = lookup("STOREFRONT_PAGE_SIZE") {
            let size: u32 = size
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("STOREFRONT_PAGE_SIZE: {e}")))?;
            if size == 0 {
                return Err(Error::Config("STOREFRONT_PAGE_SIZE must be at least 1".into()));
            }
            config = config.with_page_size(size);
        }
        if let Some(path) = lookup("STOREFRONT_TOKEN_FILE").filter(|p| !p.is_empty()) {
            config = config.with_token_file(path);
        }

        Ok(config)
    }
}
