#![doc = include_str!("../README.md")]

pub mod auth;
pub mod catalog;
pub mod claims;
pub mod config;
pub mod discovery;
pub mod error;
pub mod oauth;
pub mod pkce;
pub mod session;
pub mod store;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use auth::AuthController;
#[cfg(feature = "graphql")]
pub use catalog::GraphqlCatalog;
pub use catalog::{
    CatalogGateway, Cursor, LoadOutcome, PageCache, PageEntry, PaginationController, Product,
    ProductPage,
};
pub use claims::{Claims, Identity, decode_identity};
pub use config::StorefrontConfig;
pub use discovery::ProviderMetadata;
pub use error::Error;
#[cfg(feature = "oauth")]
pub use oauth::HttpIdentityProvider;
pub use oauth::{
    AuthorizationOutcome, AuthorizationRequest, CodeExchange, OAuthConfig, TokenResponse,
};
pub use pkce::Pkce;
pub use session::{AuthState, Session};
pub use store::{FileTokenStore, MemoryTokenStore};
pub use traits::{IdentityProvider, StoreError, TokenStore, UserAgent};
