// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory token storage.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use secrecy::SecretString;

use crate::types::TokenGrant;

/// Holds the OAuth tokens of one account.
///
/// The access and refresh tokens are supplied at construction. The identity
/// token and the expiry are only known after the first refresh. Tokens are
/// never persisted; a new process must be given fresh tokens.
///
/// The expiry is advisory: refresh is driven by 401/403 responses, never by
/// the clock.
///
/// # Examples
///
/// ```
/// use smartwater_lib::auth::TokenStore;
/// use secrecy::ExposeSecret;
///
/// let store = TokenStore::new("access", "refresh");
/// assert_eq!(store.access_token().expose_secret(), "access");
/// assert!(store.identity_token().is_none());
/// assert!(store.expires_at().is_none());
/// ```
#[derive(Debug)]
pub struct TokenStore {
    inner: RwLock<Tokens>,
}

#[derive(Debug)]
struct Tokens {
    access: SecretString,
    refresh: SecretString,
    identity: Option<SecretString>,
    expires_at: Option<DateTime<Utc>>,
    generation: u64,
}

impl TokenStore {
    /// Creates a store from the tokens obtained at sign-in.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Tokens {
                access: SecretString::from(access_token.into()),
                refresh: SecretString::from(refresh_token.into()),
                identity: None,
                expires_at: None,
                generation: 0,
            }),
        }
    }

    /// Returns the current bearer token.
    #[must_use]
    pub fn access_token(&self) -> SecretString {
        self.inner.read().access.clone()
    }

    /// Returns the current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> SecretString {
        self.inner.read().refresh.clone()
    }

    /// Returns the identity token, if a refresh has provided one.
    #[must_use]
    pub fn identity_token(&self) -> Option<SecretString> {
        self.inner.read().identity.clone()
    }

    /// Returns when the access token expires, if known.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().expires_at
    }

    /// Returns `true` if the expiry is known and lies before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expiry| expiry <= now)
    }

    /// Returns `true` if the access token is known to have expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns how many refreshes have been applied to this store.
    ///
    /// A caller that saw a rejection under one generation and finds a newer
    /// one knows another task already refreshed.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Stores the tokens of a successful refresh, superseding the old ones.
    ///
    /// The refresh and identity tokens are only replaced when the grant
    /// carries new values.
    pub fn apply(&self, grant: &TokenGrant, now: DateTime<Utc>) {
        let mut tokens = self.inner.write();
        tokens.access = SecretString::from(grant.access_token.clone());
        tokens.expires_at = Some(now + TimeDelta::seconds(grant.expires_in));
        if let Some(identity) = &grant.id_token {
            tokens.identity = Some(SecretString::from(identity.clone()));
        }
        if let Some(refresh) = &grant.refresh_token {
            tokens.refresh = SecretString::from(refresh.clone());
        }
        tokens.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn grant(refresh: Option<&str>) -> TokenGrant {
        TokenGrant {
            access_token: "new-access".to_string(),
            expires_in: 3600,
            id_token: Some("identity".to_string()),
            refresh_token: refresh.map(str::to_string),
        }
    }

    #[test]
    fn apply_replaces_access_and_identity() {
        let store = TokenStore::new("old-access", "refresh");
        let now = Utc::now();
        store.apply(&grant(None), now);

        assert_eq!(store.access_token().expose_secret(), "new-access");
        assert_eq!(store.identity_token().unwrap().expose_secret(), "identity");
        assert_eq!(store.refresh_token().expose_secret(), "refresh");
        assert_eq!(store.expires_at(), Some(now + TimeDelta::seconds(3600)));
    }

    #[test]
    fn apply_rotates_refresh_token() {
        let store = TokenStore::new("a", "refresh");
        store.apply(&grant(Some("rotated")), Utc::now());
        assert_eq!(store.refresh_token().expose_secret(), "rotated");
    }

    #[test]
    fn generation_counts_refreshes() {
        let store = TokenStore::new("a", "r");
        assert_eq!(store.generation(), 0);
        store.apply(&grant(None), Utc::now());
        store.apply(&grant(None), Utc::now());
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn expiry_is_advisory() {
        let store = TokenStore::new("a", "r");
        let now = Utc::now();
        assert!(!store.is_expired_at(now));

        store.apply(&grant(None), now);
        assert!(!store.is_expired_at(now));
        assert!(store.is_expired_at(now + TimeDelta::seconds(3600)));
        assert!(!store.is_expired());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let store = TokenStore::new("super-secret-access", "super-secret-refresh");
        let debug = format!("{store:?}");
        assert!(!debug.contains("super-secret"));
    }
}
