//! Session resolution against the user table.

use crate::database::Database;
use crate::models::User;
use async_trait::async_trait;
use awesome_core::session::sha1_hex;
use awesome_core::{Principal, PrincipalResolver, Result, SessionCodec};
use tracing::debug;

/// Stored credential for a client-side password hash
#[must_use]
pub fn hash_password(id: &str, passwd: &str) -> String {
    sha1_hex(&format!("{id}:{passwd}"))
}

/// Resolves `awesession` cookies to the signed-in user
#[derive(Clone)]
pub struct SessionResolver {
    db: Database,
    codec: SessionCodec,
}

impl SessionResolver {
    /// Resolver reading users from `db`, verifying with `codec`
    pub const fn new(db: Database, codec: SessionCodec) -> Self {
        Self { db, codec }
    }
}

#[async_trait]
impl PrincipalResolver for SessionResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Principal>> {
        let Some(session) = SessionCodec::decode(token) else {
            return Ok(None);
        };
        let Some(user) = self.db.find::<User>(&session.id).await? else {
            debug!(id = %session.id, "session for unknown user");
            return Ok(None);
        };
        if !self.codec.verify(&session, &user.passwd) {
            debug!(id = %session.id, "invalid or expired session");
            return Ok(None);
        }
        Ok(Some(user.principal()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{next_id, now, DEFAULT_IMAGE};

    async fn setup() -> (SessionResolver, User) {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        db.init_schema().await.unwrap();
        let id = next_id();
        let user = User {
            passwd: hash_password(&id, &sha1_hex("secret")),
            id,
            email: "reader@example.com".to_string(),
            admin: false,
            name: "Reader".to_string(),
            image: DEFAULT_IMAGE.to_string(),
            created_at: now(),
        };
        db.save(&user).await.unwrap();
        (SessionResolver::new(db, SessionCodec::new("Awesome")), user)
    }

    #[test]
    fn test_hash_password_is_salted_by_id() {
        assert_ne!(hash_password("a", "x"), hash_password("b", "x"));
        assert_eq!(hash_password("a", "x").len(), 40);
    }

    #[tokio::test]
    async fn test_resolves_valid_cookie() {
        let (resolver, user) = setup().await;
        let token = SessionCodec::new("Awesome").encode(&user.id, &user.passwd, 3600);
        let principal = resolver.resolve(&token).await.unwrap().unwrap();
        assert_eq!(principal.id, user.id);
        assert_eq!(principal.email, "reader@example.com");
    }

    #[tokio::test]
    async fn test_rejects_bad_cookies() {
        let (resolver, user) = setup().await;
        let other_secret = SessionCodec::new("other").encode(&user.id, &user.passwd, 3600);
        assert!(resolver.resolve(&other_secret).await.unwrap().is_none());

        let unknown = SessionCodec::new("Awesome").encode("nobody", &user.passwd, 3600);
        assert!(resolver.resolve(&unknown).await.unwrap().is_none());

        assert!(resolver.resolve("garbage").await.unwrap().is_none());
    }
}
