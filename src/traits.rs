use std::future::Future;
use std::sync::Arc;

use crate::discovery::ProviderMetadata;
use crate::error::Error;
use crate::oauth::{AuthorizationOutcome, AuthorizationRequest, CodeExchange, TokenResponse};

/// Error type returned by consumer-provided stores.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Durable key/value persistence for tokens.
///
/// Values must survive process restarts. The controller only ever writes the
/// keys in [`crate::store`]; an absent access token at startup means logged out.
///
/// # Example
///
/// ```rust,ignore
/// impl TokenStore for Keychain {
///     async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
///         self.inner.write_secret(key, value).await?;
///         Ok(())
///     }
///
///     async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
///         Ok(self.inner.read_secret(key).await?)
///     }
///
///     async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
///         for key in keys {
///             self.inner.delete_secret(key).await?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait TokenStore: Send + Sync + 'static {
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Removes every key in `keys`; missing keys are not an error.
    fn remove(&self, keys: &[&str]) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<T: TokenStore> TokenStore for Arc<T> {
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send {
        (**self).get(key)
    }

    fn remove(&self, keys: &[&str]) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).remove(keys)
    }
}

/// Identity provider gateway: discovery plus the token endpoint.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolves the provider's discovery document.
    fn discover(&self) -> impl Future<Output = Result<ProviderMetadata, Error>> + Send;

    /// Exchanges an authorization code and PKCE verifier for tokens.
    fn exchange_code(
        &self,
        metadata: &ProviderMetadata,
        exchange: &CodeExchange<'_>,
    ) -> impl Future<Output = Result<TokenResponse, Error>> + Send;
}

/// The interactive step: opens the authorization URL in a browser and
/// reports how the user left it.
pub trait UserAgent: Send + Sync {
    fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> impl Future<Output = AuthorizationOutcome> + Send;
}
