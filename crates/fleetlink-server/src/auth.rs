//! # JWT auth collaborator (§6)
//!
//! `verify(bearer) -> { user_id, is_admin } | Error`, backed by `jsonwebtoken` against the
//! shared `JWT_SECRET`. This is the only concrete `AuthProvider` this workspace ships; a
//! production deployment's identity service is an external collaborator per §1.

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use fleetlink_core::{AuthError, AuthProvider, Principal, UserId};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: uuid::Uuid,
    #[serde(default)]
    is_admin: bool,
    exp: u64,
}

pub struct JwtAuthProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn verify(&self, bearer: &str) -> Result<Principal, AuthError> {
        let token = bearer.strip_prefix("Bearer ").unwrap_or(bearer);
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::NotAuthenticated)?;
        Ok(Principal {
            user_id: UserId(data.claims.sub),
            is_admin: data.claims.is_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: uuid::Uuid, is_admin: bool) -> String {
        #[derive(serde::Serialize)]
        struct Out {
            sub: uuid::Uuid,
            is_admin: bool,
            exp: u64,
        }
        let exp = (std::time::SystemTime::now() + std::time::Duration::from_secs(3600))
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        encode(&Header::default(), &Out { sub, is_admin, exp }, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[tokio::test]
    async fn verifies_a_well_formed_token() {
        let secret = "top-secret";
        let user_id = uuid::Uuid::new_v4();
        let bearer = token(secret, user_id, true);

        let provider = JwtAuthProvider::new(secret);
        let principal = provider.verify(&bearer).await.unwrap();
        assert_eq!(principal.user_id, UserId(user_id));
        assert!(principal.is_admin);
    }

    #[tokio::test]
    async fn rejects_a_token_signed_with_a_different_secret() {
        let bearer = token("wrong-secret", uuid::Uuid::new_v4(), false);
        let provider = JwtAuthProvider::new("top-secret");
        assert!(provider.verify(&bearer).await.is_err());
    }

    #[tokio::test]
    async fn strips_the_bearer_prefix() {
        let secret = "top-secret";
        let user_id = uuid::Uuid::new_v4();
        let raw = token(secret, user_id, false);
        let provider = JwtAuthProvider::new(secret);
        let principal = provider.verify(&format!("Bearer {raw}")).await.unwrap();
        assert_eq!(principal.user_id, UserId(user_id));
    }
}
