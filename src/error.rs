/// Errors raised by the session controller, the catalog gateways and the page cache.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The user cancelled or dismissed the browser step.
    #[error("Authentication cancelled by user")]
    AuthCancelled,

    /// The identity provider reported an error during authorization.
    #[error("{0}")]
    AuthProvider(String),

    /// The authorization step reported success without a code.
    #[error("Authentication failed - no authorization code")]
    AuthNoCode,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// A login was attempted before provider discovery completed.
    #[error("Identity provider discovery has not completed")]
    DiscoveryRequired,

    #[error("Identity provider discovery failed: {0}")]
    Discovery(String),

    #[error("HTTP error! status: {status}")]
    GatewayHttp { status: u16 },

    #[error("{0}")]
    GatewayGraphql(String),

    #[error("No products data received")]
    GatewayEmptyResponse,

    /// Page `page` was requested before page `page - 1` produced an end cursor.
    #[error("Cursor chain broken: page {} is not cached", .page.saturating_sub(1))]
    CursorChainBroken { page: u32 },

    #[error("Invalid page number: {0}")]
    InvalidPage(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(any(feature = "oauth", feature = "graphql"))]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the error belongs to the login path.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthCancelled
                | Self::AuthProvider(_)
                | Self::AuthNoCode
                | Self::TokenExchangeFailed(_)
                | Self::DiscoveryRequired
                | Self::Discovery(_)
        )
    }

    /// Whether the error came back from the catalog service.
    #[must_use]
    pub fn is_gateway(&self) -> bool {
        match self {
            Self::GatewayHttp { .. } | Self::GatewayGraphql(_) | Self::GatewayEmptyResponse => true,
            #[cfg(any(feature = "oauth", feature = "graphql"))]
            Self::Http(_) => true,
            _ => false,
        }
    }
}
