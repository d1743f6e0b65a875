use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::token::{Expiring, Token, TokenError};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum AuthTokenType {
    Access,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthTokenClaims {
    #[serde(rename = "uid")]
    pub user_id: Uuid,
    #[serde(rename = "eml")]
    pub user_email: String,
    #[serde(rename = "exp")]
    pub expiration: u64,
    #[serde(rename = "typ")]
    pub token_type: AuthTokenType,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewAuthTokenClaims<'a> {
    #[serde(rename = "uid")]
    pub user_id: Uuid,
    #[serde(rename = "eml")]
    pub user_email: &'a str,
    #[serde(rename = "exp")]
    pub expiration: u64,
    #[serde(rename = "typ")]
    pub token_type: AuthTokenType,
}

impl<'a> NewAuthTokenClaims<'a> {
    pub fn expiring_in(
        user_id: Uuid,
        user_email: &'a str,
        token_type: AuthTokenType,
        lifetime: Duration,
    ) -> Self {
        let expiration = (SystemTime::now() + lifetime)
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Self {
            user_id,
            user_email,
            expiration,
            token_type,
        }
    }
}

impl Expiring for AuthTokenClaims {
    fn expiration(&self) -> u64 {
        self.expiration
    }
}

pub struct AuthToken {}

impl AuthToken {
    pub fn sign_new(claims: NewAuthTokenClaims, signing_key: &[u8]) -> Result<String, TokenError> {
        super::sign(&claims, signing_key)
    }
}

impl Token for AuthToken {
    type Claims = AuthTokenClaims;
}
