use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::discovery::ProviderMetadata;
use crate::error::Error;
use crate::oauth::{AuthorizationOutcome, AuthorizationRequest, CodeExchange, OAuthConfig};
use crate::session::{self, AuthState, Session};
use crate::store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::traits::{IdentityProvider, TokenStore, UserAgent};

struct Inner {
    state: AuthState,
    session: Session,
    metadata: Option<ProviderMetadata>,
    error: Option<String>,
}

/// Drives the authorization-code-with-PKCE login and owns the [`Session`].
///
/// State changes are applied synchronously under a lock; token persistence
/// runs afterwards on background tasks that are chained so they complete in
/// the order they were issued. Requires a Tokio runtime.
///
/// The controller assumes a single initiator: callers gate their login
/// trigger on [`AuthState::is_busy`].
pub struct AuthController<P, S> {
    config: OAuthConfig,
    provider: P,
    store: Arc<S>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<AuthState>,
    last_write: Mutex<Option<JoinHandle<()>>>,
}

impl<P: IdentityProvider, S: TokenStore> AuthController<P, S> {
    #[must_use]
    pub fn new(config: OAuthConfig, provider: P, store: S) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Idle);
        Self {
            config,
            provider,
            store: Arc::new(store),
            inner: Mutex::new(Inner {
                state: AuthState::Idle,
                session: Session::default(),
                metadata: None,
                error: None,
            }),
            state_tx,
            last_write: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.inner.lock().state
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.lock().session.clone()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.inner.lock().session.is_logged_in
    }

    /// Bearer token for downstream requests, when logged in.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .session
            .is_logged_in
            .then(|| inner.session.access_token.clone())
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        let inner = self.inner.lock();
        inner.session.is_logged_in && inner.session.has_role(role)
    }

    /// User-visible message for the last failed discovery or login.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.inner.lock().error = None;
    }

    #[must_use]
    pub fn metadata(&self) -> Option<ProviderMetadata> {
        self.inner.lock().metadata.clone()
    }

    /// Receiver that observes every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    fn transition(&self, inner: &mut Inner, next: AuthState) {
        inner.state = next;
        self.state_tx.send_replace(next);
    }

    // ── Discovery ──────────────────────────────────────────────────────

    /// Resolves the provider's discovery document and keeps it for login.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] (or [`Error::Http`]) when the document
    /// cannot be fetched or the provider does not offer S256 PKCE.
    pub async fn discover(&self) -> Result<ProviderMetadata, Error> {
        let previous = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            self.transition(&mut inner, AuthState::AwaitingProviderDiscovery);
            previous
        };
        let resume = if previous == AuthState::LoggedIn {
            AuthState::LoggedIn
        } else {
            AuthState::Idle
        };

        let result = self.provider.discover().await.and_then(|metadata| {
            if metadata.supports_s256() {
                Ok(metadata)
            } else {
                Err(Error::Discovery(
                    "provider does not support S256 PKCE".into(),
                ))
            }
        });

        let mut inner = self.inner.lock();
        match result {
            Ok(metadata) => {
                tracing::debug!(issuer = %metadata.issuer, "Identity provider discovered");
                inner.metadata = Some(metadata.clone());
                inner.error = None;
                self.transition(&mut inner, resume);
                Ok(metadata)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity provider discovery failed");
                inner.error = Some(e.to_string());
                let next = if resume == AuthState::LoggedIn {
                    AuthState::LoggedIn
                } else {
                    AuthState::Failed
                };
                self.transition(&mut inner, next);
                Err(e)
            }
        }
    }

    /// Prepares an authorization request with fresh PKCE material.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DiscoveryRequired`] before [`discover`](Self::discover)
    /// has succeeded.
    pub fn authorization_request(&self) -> Result<AuthorizationRequest, Error> {
        let inner = self.inner.lock();
        let metadata = inner.metadata.as_ref().ok_or(Error::DiscoveryRequired)?;
        Ok(AuthorizationRequest::new(&self.config, metadata))
    }

    // ── Login ──────────────────────────────────────────────────────────

    /// Runs the interactive step for `request` through `agent`, exchanges the
    /// returned code and logs the user in.
    ///
    /// The attempt starts from an empty session. On success the state is
    /// `LoggedIn` before the tokens reach the store. On failure the session
    /// stays empty, the error message is recorded and the state is `Failed`.
    ///
    /// # Errors
    ///
    /// [`Error::AuthCancelled`], [`Error::AuthProvider`], [`Error::AuthNoCode`],
    /// [`Error::TokenExchangeFailed`] or [`Error::DiscoveryRequired`].
    pub async fn begin_login<A: UserAgent>(
        &self,
        request: &AuthorizationRequest,
        agent: &A,
    ) -> Result<Session, Error> {
        match self.run_login(request, agent).await {
            Ok(session) => Ok(session),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn run_login<A: UserAgent>(
        &self,
        request: &AuthorizationRequest,
        agent: &A,
    ) -> Result<Session, Error> {
        let metadata = {
            let mut inner = self.inner.lock();
            let metadata = inner.metadata.clone().ok_or(Error::DiscoveryRequired)?;
            inner.session = Session::default();
            inner.error = None;
            self.transition(&mut inner, AuthState::AwaitingUserInteraction);
            metadata
        };

        let code = match agent.authorize(request).await {
            AuthorizationOutcome::Cancel | AuthorizationOutcome::Dismiss => {
                return Err(Error::AuthCancelled);
            }
            AuthorizationOutcome::Error { message } => {
                return Err(Error::AuthProvider(
                    message.unwrap_or_else(|| "Authentication error occurred".into()),
                ));
            }
            AuthorizationOutcome::Unknown => {
                return Err(Error::AuthProvider("Unknown authentication result".into()));
            }
            AuthorizationOutcome::Success { code, state } => {
                if state.is_some_and(|s| s != request.state) {
                    tracing::warn!("OAuth state mismatch");
                    return Err(Error::AuthProvider("state_mismatch".into()));
                }
                code.filter(|c| !c.is_empty()).ok_or(Error::AuthNoCode)?
            }
        };

        self.set_state(AuthState::ExchangingCode);

        let exchange = CodeExchange {
            client_id: self.config.client_id(),
            code: &code,
            code_verifier: request.code_verifier(),
            redirect_uri: &request.redirect_uri,
        };
        let tokens = self
            .provider
            .exchange_code(&metadata, &exchange)
            .await
            .map_err(|e| match e {
                Error::TokenExchangeFailed(_) => e,
                other => Error::TokenExchangeFailed(other.to_string()),
            })?;

        if tokens.access_token.is_empty() {
            return Err(Error::TokenExchangeFailed("Invalid token response".into()));
        }

        let session =
            Session::from_tokens(tokens, self.config.client_id(), session::now_epoch_ms());
        {
            let mut inner = self.inner.lock();
            inner.session = session.clone();
            inner.error = None;
            self.transition(&mut inner, AuthState::LoggedIn);
        }
        tracing::info!(
            user = session.identity.display_name().unwrap_or("unknown"),
            roles = session.roles.len(),
            "OAuth2 login successful"
        );

        self.persist(&session);
        Ok(session)
    }

    fn set_state(&self, next: AuthState) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, next);
    }

    fn fail(&self, error: &Error) {
        match error {
            Error::AuthCancelled => tracing::info!("Login cancelled by user"),
            Error::TokenExchangeFailed(_) => {
                tracing::error!(error = %error, "Token exchange failed");
            }
            _ => tracing::warn!(error = %error, "Login failed"),
        }
        let mut inner = self.inner.lock();
        inner.session = Session::default();
        inner.error = Some(error.to_string());
        self.transition(&mut inner, AuthState::Failed);
    }

    // ── Logout ─────────────────────────────────────────────────────────

    /// Clears the session now and the persisted tokens in the background.
    ///
    /// The persisted tokens are cleared even when the in-memory session is
    /// already empty, since a failed login attempt wipes the session but not
    /// the store.
    pub fn logout(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.session.is_logged_in || inner.state == AuthState::LoggedIn {
                inner.session = Session::default();
                inner.error = None;
                self.transition(&mut inner, AuthState::Idle);
                tracing::info!("Logged out");
            } else {
                tracing::debug!("Logout requested while logged out");
            }
        }

        let store = Arc::clone(&self.store);
        self.enqueue_write(async move {
            if let Err(e) = store.remove(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]).await {
                tracing::warn!(error = %e, "Failed to clear persisted tokens during logout");
            }
        });
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Rehydrates the session from the token store at cold start.
    ///
    /// Returns whether a session is now active. A missing access token, or a
    /// store that cannot be read, leaves the controller logged out.
    pub async fn restore(&self) -> bool {
        let access_token = match self.store.get(ACCESS_TOKEN_KEY).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted access token");
                None
            }
        };
        let Some(access_token) = access_token else {
            return self.is_logged_in();
        };

        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read persisted refresh token");
                None
            });

        let session = Session::restored(
            access_token,
            refresh_token,
            self.config.client_id(),
            session::now_epoch_ms(),
        );

        let mut inner = self.inner.lock();
        if inner.session.is_logged_in || inner.state.is_busy() {
            return inner.session.is_logged_in;
        }
        inner.session = session;
        self.transition(&mut inner, AuthState::LoggedIn);
        tracing::info!("Session restored from token store");
        true
    }

    fn persist(&self, session: &Session) {
        let store = Arc::clone(&self.store);
        let access_token = session.access_token.clone();
        let refresh_token = session.refresh_token.clone();

        self.enqueue_write(async move {
            if let Err(e) = store.set(ACCESS_TOKEN_KEY, &access_token).await {
                tracing::warn!(error = %e, "Failed to persist access token");
            }
            let refresh = match refresh_token {
                Some(token) => store.set(REFRESH_TOKEN_KEY, &token).await,
                None => store.remove(&[REFRESH_TOKEN_KEY]).await,
            };
            if let Err(e) = refresh {
                tracing::warn!(error = %e, "Failed to persist refresh token");
            }
        });
    }

    /// Spawns `write` after every previously queued write has finished.
    fn enqueue_write<F>(&self, write: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut last = self.last_write.lock();
        let previous = last.take();
        *last = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    tracing::warn!(error = %e, "Previous token write did not complete");
                }
            }
            write.await;
        }));
    }

    /// Waits for every token write queued before this call to finish.
    ///
    /// Queues a marker behind those writes, so the chain stays intact for
    /// writes queued while waiting.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue_write(async move {
            let _ = done_tx.send(());
        });
        if done_rx.await.is_err() {
            tracing::warn!("Token write chain stopped before flush completed");
        }
    }
}
