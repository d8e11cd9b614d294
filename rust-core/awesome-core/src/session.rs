//! # Session Cookies
//!
//! Cookie value format: `{id}-{expires}-{signature}` where the signature is
//! the SHA-1 hex digest of `{id}-{credential}-{expires}-{secret}`. The
//! credential is the user's stored password hash, so changing the password
//! invalidates every outstanding cookie.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default session lifetime in seconds
pub const DEFAULT_MAX_AGE: u64 = 86400;

/// Value written when a cookie is deleted
pub const DELETED_COOKIE_VALUE: &str = "-deleted-";

/// Identity attached to a request after session verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// User id
    pub id: String,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Avatar URL
    pub image: String,
    /// Administrator flag
    pub admin: bool,
}

/// Turns a session cookie value into a principal
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Resolve `token`; `Ok(None)` for unknown, expired or tampered tokens
    async fn resolve(&self, token: &str) -> Result<Option<Principal>>;
}

/// Decoded but not yet verified cookie value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    /// User id
    pub id: String,
    /// Expiry as unix seconds
    pub expires: u64,
    signature: String,
}

/// Signs and verifies session cookie values
#[derive(Clone)]
pub struct SessionCodec {
    secret: String,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}

impl SessionCodec {
    /// Codec bound to a server secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Cookie value valid for `max_age` seconds from now
    #[must_use]
    pub fn encode(&self, id: &str, credential: &str, max_age: u64) -> String {
        self.encode_at(id, credential, max_age, unix_now())
    }

    /// Cookie value valid for `max_age` seconds from `now`
    #[must_use]
    pub fn encode_at(&self, id: &str, credential: &str, max_age: u64, now: u64) -> String {
        let expires = now.saturating_add(max_age);
        let signature = self.signature(id, credential, expires);
        format!("{id}-{expires}-{signature}")
    }

    /// Split a cookie value into its segments.
    ///
    /// `None` unless there are exactly three segments and the expiry is numeric.
    #[must_use]
    pub fn decode(token: &str) -> Option<SessionToken> {
        let mut parts = token.split('-');
        let (Some(id), Some(expires), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        if id.is_empty() || signature.is_empty() {
            return None;
        }
        Some(SessionToken {
            id: id.to_string(),
            expires: expires.parse().ok()?,
            signature: signature.to_string(),
        })
    }

    /// Token is unexpired and was signed for `credential`
    #[must_use]
    pub fn verify(&self, token: &SessionToken, credential: &str) -> bool {
        self.verify_at(token, credential, unix_now())
    }

    /// Same as [`Self::verify`] with an explicit clock
    #[must_use]
    pub fn verify_at(&self, token: &SessionToken, credential: &str, now: u64) -> bool {
        if token.expires < now {
            return false;
        }
        self.signature(&token.id, credential, token.expires) == token.signature
    }

    fn signature(&self, id: &str, credential: &str, expires: u64) -> String {
        sha1_hex(&format!("{id}-{credential}-{expires}-{}", self.secret))
    }
}

/// Lowercase hex SHA-1 digest of `input`
#[must_use]
pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `Set-Cookie` header value for a session cookie
#[must_use]
pub fn set_cookie(name: &str, value: &str, max_age: u64) -> String {
    format!("{name}={value}; Max-Age={max_age}; Path=/; HttpOnly")
}

/// `Set-Cookie` header value that removes the session cookie
#[must_use]
pub fn delete_cookie(name: &str) -> String {
    set_cookie(name, DELETED_COOKIE_VALUE, 0)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
