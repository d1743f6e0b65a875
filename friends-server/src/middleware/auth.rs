use friends_common::token::auth_token::{AuthToken, AuthTokenClaims, AuthTokenType};
use friends_common::token::{Token, TokenError};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use futures::future;
use std::marker::PhantomData;
use std::time::Duration;

use crate::env;
use crate::handlers::error::HttpErrorResponse;
use crate::middleware::TokenLocation;

pub trait RequestAuthTokenType {
    fn token_type() -> AuthTokenType;
    fn token_lifetime() -> Duration;
}

#[derive(Debug)]
pub struct Access {}

impl RequestAuthTokenType for Access {
    fn token_type() -> AuthTokenType {
        AuthTokenType::Access
    }
    fn token_lifetime() -> Duration {
        env::CONF.lifetimes.access_token_lifetime
    }
}

/// Resolves the caller from a signed auth token. Handlers that take this extractor are only
/// reached by authenticated users.
#[derive(Debug)]
pub struct VerifiedToken<T: RequestAuthTokenType, L: TokenLocation> {
    pub claims: AuthTokenClaims,
    _marker: PhantomData<(T, L)>,
}

impl<T, L> FromRequest for VerifiedToken<T, L>
where
    T: RequestAuthTokenType,
    L: TokenLocation,
{
    type Error = HttpErrorResponse;
    type Future = future::Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match verify_token::<T, L>(req) {
            Ok(claims) => future::ok(VerifiedToken {
                claims,
                _marker: PhantomData,
            }),
            Err(e) => {
                log::debug!("Rejected auth token: {e}");
                future::err(e.into())
            }
        }
    }
}

#[inline]
fn verify_token<T, L>(req: &HttpRequest) -> Result<AuthTokenClaims, TokenError>
where
    T: RequestAuthTokenType,
    L: TokenLocation,
{
    let token = L::get_from_request(req).ok_or(TokenError::TokenMissing)?;
    let decoded_token = AuthToken::decode(token)?;
    let claims = decoded_token.verify(&env::CONF.keys.token_signing_key)?;

    if claims.token_type != T::token_type() {
        return Err(TokenError::WrongTokenType);
    }

    Ok(claims.clone())
}
