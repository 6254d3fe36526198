//! Bearer credential types
//!
//! A [`Credential`] is the access/refresh pair held by the credential store.
//! The client never inspects token contents: an access token is usable until
//! the server answers 401.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access/refresh token pair for bearer authentication
///
/// Serialized with camelCase field names; snake_case is accepted on read so
/// records written by other tooling still load.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Short-lived token attached to every request
    #[serde(alias = "access_token")]
    pub access_token: String,

    /// Long-lived token used only to obtain a new access token.
    /// `None` makes refresh impossible.
    #[serde(default, alias = "refresh_token", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    /// Create a credential with both tokens
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: Some(refresh_token.into()) }
    }

    /// Create a credential that cannot be refreshed
    #[must_use]
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: None }
    }

    /// Whether a refresh can be attempted with this credential
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|token| !token.is_empty())
    }

    /// Build the credential that replaces `self` after a successful refresh.
    ///
    /// The server may omit the refresh token, in which case the current one
    /// stays in place.
    #[must_use]
    pub fn renewed(&self, grant: TokenGrant) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or_else(|| self.refresh_token.clone()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Tokens issued by a successful refresh call
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}
