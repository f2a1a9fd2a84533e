//! Scripted collaborators shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::catalog::{CatalogGateway, Cursor, Product, ProductPage};
use crate::discovery::ProviderMetadata;
use crate::error::Error;
use crate::oauth::{
    AuthorizationOutcome, AuthorizationRequest, CodeExchange, OAuthConfig, TokenResponse,
};
use crate::store::MemoryTokenStore;
use crate::traits::{IdentityProvider, StoreError, TokenStore, UserAgent};

pub(crate) fn test_config() -> OAuthConfig {
    OAuthConfig::new(
        "login-app",
        "com.signusk://oauthredirect".parse().unwrap(),
        "https://idp.example.com/realms/shop".parse().unwrap(),
    )
}

pub(crate) fn test_metadata() -> ProviderMetadata {
    ProviderMetadata::new(
        "https://idp.example.com/realms/shop",
        "https://idp.example.com/realms/shop/protocol/openid-connect/auth"
            .parse()
            .unwrap(),
        "https://idp.example.com/realms/shop/protocol/openid-connect/token"
            .parse()
            .unwrap(),
    )
}

// ── Identity provider ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct RecordedExchange {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

#[derive(Clone)]
enum ExchangeScript {
    Tokens(TokenResponse),
    HttpStatus(u16),
}

#[derive(Clone)]
pub(crate) struct ScriptedProvider {
    discoverable: bool,
    exchange: ExchangeScript,
    exchanges: Arc<Mutex<Vec<RecordedExchange>>>,
}

impl ScriptedProvider {
    pub fn returning(tokens: TokenResponse) -> Self {
        Self {
            discoverable: true,
            exchange: ExchangeScript::Tokens(tokens),
            exchanges: Arc::default(),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            exchange: ExchangeScript::HttpStatus(status),
            ..Self::returning(TokenResponse::default())
        }
    }

    pub fn undiscoverable() -> Self {
        Self {
            discoverable: false,
            ..Self::returning(TokenResponse::default())
        }
    }

    pub fn exchanges(&self) -> Vec<RecordedExchange> {
        self.exchanges.lock().clone()
    }
}

impl IdentityProvider for ScriptedProvider {
    async fn discover(&self) -> Result<ProviderMetadata, Error> {
        if self.discoverable {
            Ok(test_metadata())
        } else {
            Err(Error::Discovery("connection refused".into()))
        }
    }

    async fn exchange_code(
        &self,
        _metadata: &ProviderMetadata,
        exchange: &CodeExchange<'_>,
    ) -> Result<TokenResponse, Error> {
        self.exchanges.lock().push(RecordedExchange {
            code: exchange.code.to_owned(),
            code_verifier: exchange.code_verifier.to_owned(),
            redirect_uri: exchange.redirect_uri.to_string(),
        });
        match &self.exchange {
            ExchangeScript::Tokens(tokens) => Ok(tokens.clone()),
            ExchangeScript::HttpStatus(status) => Err(Error::GatewayHttp { status: *status }),
        }
    }
}

// ── User agent ─────────────────────────────────────────────────────────

pub(crate) struct ScriptedAgent {
    outcome: AuthorizationOutcome,
    opened: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(outcome: AuthorizationOutcome) -> Self {
        Self {
            outcome,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

impl UserAgent for ScriptedAgent {
    async fn authorize(&self, request: &AuthorizationRequest) -> AuthorizationOutcome {
        self.opened.lock().push(request.url.to_string());
        self.outcome.clone()
    }
}

// ── Token store ────────────────────────────────────────────────────────

pub(crate) struct FailingStore;

impl TokenStore for FailingStore {
    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err("keychain unavailable".into())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err("keychain unavailable".into())
    }

    async fn remove(&self, _keys: &[&str]) -> Result<(), StoreError> {
        Err("keychain unavailable".into())
    }
}

/// In-memory store whose writes take `delay` to land.
pub(crate) struct SlowStore {
    inner: MemoryTokenStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryTokenStore::new(),
            delay,
        }
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.inner.snapshot()
    }
}

impl TokenStore for SlowStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.inner.remove(keys).await
    }
}

// ── Catalog gateway ────────────────────────────────────────────────────

pub(crate) fn product(id: &str) -> Product {
    Product::new(id, format!("Product {id}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedFetch {
    pub first: u32,
    pub after: Option<String>,
}

/// Gateway answering from pages keyed by the `after` cursor (`None` for the
/// first page). Yields once per call so concurrent loads interleave.
#[derive(Clone, Default)]
pub(crate) struct ScriptedCatalog {
    pages: Arc<Mutex<HashMap<Option<String>, ProductPage>>>,
    failures: Arc<Mutex<Vec<u16>>>,
    calls: Arc<Mutex<Vec<RecordedFetch>>>,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, after: Option<&str>, page: ProductPage) -> Self {
        self.pages.lock().insert(after.map(str::to_owned), page);
        self
    }

    /// The next call fails with `status` before consulting the pages.
    pub fn fail_next(&self, status: u16) {
        self.failures.lock().push(status);
    }

    pub fn calls(&self) -> Vec<RecordedFetch> {
        self.calls.lock().clone()
    }
}

impl CatalogGateway for ScriptedCatalog {
    async fn fetch_products(
        &self,
        first: u32,
        after: Option<&Cursor>,
    ) -> Result<ProductPage, Error> {
        let after = after.map(|c| c.as_str().to_owned());
        self.calls.lock().push(RecordedFetch {
            first,
            after: after.clone(),
        });
        tokio::task::yield_now().await;

        if let Some(status) = self.failures.lock().pop() {
            return Err(Error::GatewayHttp { status });
        }
        self.pages
            .lock()
            .get(&after)
            .cloned()
            .ok_or(Error::GatewayEmptyResponse)
    }
}

pub(crate) fn page(ids: &[&str], end_cursor: Option<&str>, has_next_page: bool) -> ProductPage {
    ProductPage {
        items: ids.iter().map(|id| product(id)).collect(),
        has_next_page,
        has_previous_page: false,
        start_cursor: None,
        end_cursor: end_cursor.map(Cursor::from),
    }
}
