pub mod auth_token;

use base64::engine::general_purpose::URL_SAFE as b64_urlsafe;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LENGTH: usize = 32;
const MAX_TOKEN_LENGTH: usize = 8192;

#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    TokenInvalid,
    TokenExpired,
    TokenMissing,
    WrongTokenType,
}

impl std::error::Error for TokenError {}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::TokenInvalid => write!(f, "TokenInvalid"),
            TokenError::TokenExpired => write!(f, "TokenExpired"),
            TokenError::TokenMissing => write!(f, "TokenMissing"),
            TokenError::WrongTokenType => write!(f, "WrongTokenType"),
        }
    }
}

pub trait Expiring {
    fn expiration(&self) -> u64;
}

/// A token whose JSON claims are followed by an HMAC-SHA256 signature over those claims,
/// encoded together as URL-safe base64.
#[derive(Debug)]
pub struct DecodedToken<C: Expiring + DeserializeOwned> {
    pub json: Vec<u8>,
    pub signature: Vec<u8>,
    pub claims: C,
}

impl<C: Expiring + DeserializeOwned> DecodedToken<C> {
    pub fn verify(&self, key: &[u8]) -> Result<&C, TokenError> {
        let mut mac = HmacSha256::new_from_slice(key).map_err(|_| TokenError::TokenInvalid)?;
        mac.update(&self.json);

        // Constant-time comparison
        if mac.verify_slice(&self.signature).is_err() {
            return Err(TokenError::TokenInvalid);
        }

        let Ok(now) = SystemTime::now().duration_since(UNIX_EPOCH) else {
            return Err(TokenError::TokenInvalid);
        };

        if self.claims.expiration() <= now.as_secs() {
            return Err(TokenError::TokenExpired);
        }

        Ok(&self.claims)
    }
}

pub trait Token {
    type Claims: Expiring + DeserializeOwned;

    fn decode(token: &str) -> Result<DecodedToken<Self::Claims>, TokenError> {
        if token.len() > MAX_TOKEN_LENGTH {
            return Err(TokenError::TokenInvalid);
        }

        let decoded_token = b64_urlsafe
            .decode(token)
            .map_err(|_| TokenError::TokenInvalid)?;

        if decoded_token.len() <= SIGNATURE_LENGTH {
            return Err(TokenError::TokenInvalid);
        }

        let json_len = decoded_token.len() - SIGNATURE_LENGTH;
        let json = &decoded_token[..json_len];

        let signature = Vec::from(&decoded_token[json_len..]);
        let claims: Self::Claims =
            serde_json::from_slice(json).map_err(|_| TokenError::TokenInvalid)?;

        Ok(DecodedToken {
            json: Vec::from(json),
            signature,
            claims,
        })
    }
}

fn sign<C: Serialize>(claims: &C, signing_key: &[u8]) -> Result<String, TokenError> {
    let mut token_unencoded = serde_json::to_vec(claims).map_err(|_| TokenError::TokenInvalid)?;

    let mut mac =
        HmacSha256::new_from_slice(signing_key).map_err(|_| TokenError::TokenInvalid)?;
    mac.update(&token_unencoded);
    token_unencoded.extend_from_slice(&mac.finalize().into_bytes());

    Ok(b64_urlsafe.encode(&token_unencoded))
}
