use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// User identity projected from the access token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Best label for display: full name, then username, then email.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .or(self.email.as_deref())
    }
}

/// Unverified claims read from a token payload.
///
/// The signature is never checked: the identity provider is trusted through
/// the transport it was reached over.
#[derive(Debug, Clone, Default)]
pub struct Claims {
    inner: Map<String, JsonValue>,
}

impl Claims {
    /// Decodes the middle segment of a `header.payload.signature` token.
    ///
    /// Returns `None` for anything that is not a JSON object payload.
    #[must_use]
    pub fn decode(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1).filter(|s| !s.is_empty())?;
        let trimmed = payload.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(trimmed)
            .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
            .ok()?;
        match serde_json::from_slice::<JsonValue>(&bytes).ok()? {
            JsonValue::Object(inner) => Some(Self { inner }),
            _ => None,
        }
    }

    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    fn string(&self, key: &str) -> Option<String> {
        self.get_claim(key)
            .and_then(JsonValue::as_str)
            .map(str::to_owned)
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            email: self.string("email"),
            email_verified: self.get_claim("email_verified").and_then(JsonValue::as_bool),
            name: self.string("name"),
            preferred_username: self.string("preferred_username"),
            given_name: self.string("given_name"),
            family_name: self.string("family_name"),
        }
    }

    /// Realm roles plus the roles granted to `client_id`, deduplicated in order.
    #[must_use]
    pub fn roles(&self, client_id: &str) -> Vec<String> {
        let realm = self
            .get_claim("realm_access")
            .and_then(|v| v.get("roles"));
        let client = self
            .get_claim("resource_access")
            .and_then(|v| v.get(client_id))
            .and_then(|v| v.get("roles"));

        let mut roles: Vec<String> = Vec::new();
        for role in [realm, client]
            .into_iter()
            .flatten()
            .filter_map(JsonValue::as_array)
            .flatten()
            .filter_map(JsonValue::as_str)
        {
            if !roles.iter().any(|r| r == role) {
                roles.push(role.to_owned());
            }
        }
        roles
    }
}

/// Decodes the identity carried by `access_token`.
///
/// Failures are logged and produce an empty identity; they never fail a login.
#[must_use]
pub fn decode_identity(access_token: &str) -> Identity {
    match Claims::decode(access_token) {
        Some(claims) => claims.identity(),
        None => {
            tracing::warn!("Access token payload could not be decoded; identity left empty");
            Identity::default()
        }
    }
}
