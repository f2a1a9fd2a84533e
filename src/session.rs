use serde::{Deserialize, Serialize};

use crate::claims::{Claims, Identity};
use crate::oauth::TokenResponse;

/// Phase of the login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    Idle,
    AwaitingProviderDiscovery,
    AwaitingUserInteraction,
    ExchangingCode,
    LoggedIn,
    /// The last attempt failed; a new login starts from scratch.
    Failed,
}

impl AuthState {
    /// Whether a discovery or login is in flight.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Self::AwaitingProviderDiscovery | Self::AwaitingUserInteraction | Self::ExchangingCode
        )
    }
}

/// Authentication state of the device.
///
/// Snapshots are handed out by [`AuthController`](crate::AuthController); the
/// controller's own copy only changes on login, logout or restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// Lifetime reported by the provider; `0` when unknown.
    pub expires_in_seconds: u64,
    pub issued_at_epoch_ms: i64,
    pub is_logged_in: bool,
    pub identity: Identity,
    pub roles: Vec<String>,
}

impl Session {
    /// Session for a fresh token response. Identity and roles are decoded
    /// best-effort from the access token.
    #[must_use]
    pub fn from_tokens(tokens: TokenResponse, client_id: &str, issued_at_epoch_ms: i64) -> Self {
        let (identity, roles) = derive_identity(&tokens.access_token, client_id);
        Self {
            is_logged_in: !tokens.access_token.is_empty(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            id_token: tokens.id_token,
            expires_in_seconds: tokens.expires_in.unwrap_or(0),
            issued_at_epoch_ms,
            identity,
            roles,
        }
    }

    /// Session rehydrated from persisted tokens. The provider-reported lifetime is not
    /// persisted, so expiry is unknown.
    #[must_use]
    pub fn restored(
        access_token: String,
        refresh_token: Option<String>,
        client_id: &str,
        restored_at_epoch_ms: i64,
    ) -> Self {
        let mut tokens = TokenResponse::new(access_token);
        tokens.refresh_token = refresh_token;
        Self::from_tokens(tokens, client_id, restored_at_epoch_ms)
    }

    /// Absolute expiry, when the provider reported a lifetime.
    #[must_use]
    pub fn expires_at_epoch_ms(&self) -> Option<i64> {
        if self.expires_in_seconds == 0 {
            return None;
        }
        let lifetime_ms = i64::try_from(self.expires_in_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        Some(self.issued_at_epoch_ms.saturating_add(lifetime_ms))
    }

    /// `false` when the expiry is unknown.
    #[must_use]
    pub fn is_expired(&self, now_epoch_ms: i64) -> bool {
        self.expires_at_epoch_ms()
            .is_some_and(|expires_at| now_epoch_ms >= expires_at)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

fn derive_identity(access_token: &str, client_id: &str) -> (Identity, Vec<String>) {
    if access_token.is_empty() {
        return (Identity::default(), Vec::new());
    }
    match Claims::decode(access_token) {
        Some(claims) => (claims.identity(), claims.roles(client_id)),
        None => {
            tracing::warn!("Access token payload could not be decoded; identity left empty");
            (Identity::default(), Vec::new())
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch.
#[must_use]
pub fn now_epoch_ms() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}
