use friends_common::db::{self, DbAsyncPool};
use friends_common::request_io::inputs::CredentialPair;
use friends_common::request_io::outputs::OutputLoginToken;
use friends_common::token::auth_token::{AuthToken, AuthTokenType, NewAuthTokenClaims};
use friends_common::validators::{MAX_EMAIL_CHARS, MAX_PASSWORD_BYTES};

use actix_web::{web, HttpResponse};
use std::borrow::Cow;
use zeroize::Zeroizing;

use crate::env;
use crate::handlers::credentials;
use crate::handlers::error::HttpErrorResponse;
use crate::middleware::auth::{Access, RequestAuthTokenType};

const INVALID_CREDENTIALS_MSG: &str = "Unable to log in with provided credentials.";

pub async fn login(
    db_async_pool: web::Data<DbAsyncPool>,
    credentials: web::Json<CredentialPair>,
) -> Result<HttpResponse, HttpErrorResponse> {
    if credentials.username.chars().count() > MAX_EMAIL_CHARS
        || credentials.password.len() > MAX_PASSWORD_BYTES
    {
        return Err(HttpErrorResponse::IncorrectCredential(Cow::Borrowed(
            INVALID_CREDENTIALS_MSG,
        )));
    }

    let email = credentials.username.to_lowercase();

    let auth_dao = db::auth::Dao::new(&db_async_pool);
    let user_credentials = match auth_dao.get_user_credentials(&email).await {
        Ok(c) => c,
        // Same response as a wrong password so accounts cannot be enumerated
        Err(e) if e.is_not_found() => {
            return Err(HttpErrorResponse::IncorrectCredential(Cow::Borrowed(
                INVALID_CREDENTIALS_MSG,
            )));
        }
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(Cow::Borrowed(
                "Failed to get user credentials",
            )));
        }
    };

    let password = Zeroizing::new(Vec::from(credentials.password.as_bytes()));
    let does_password_match =
        credentials::verify_password(password, user_credentials.auth_string_hash).await?;

    if !does_password_match {
        return Err(HttpErrorResponse::IncorrectCredential(Cow::Borrowed(
            INVALID_CREDENTIALS_MSG,
        )));
    }

    let claims = NewAuthTokenClaims::expiring_in(
        user_credentials.user_id,
        &user_credentials.email,
        AuthTokenType::Access,
        Access::token_lifetime(),
    );

    let token = match AuthToken::sign_new(claims, &env::CONF.keys.token_signing_key) {
        Ok(t) => t,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(Cow::Borrowed(
                "Failed to sign token",
            )));
        }
    };

    Ok(HttpResponse::Ok().json(OutputLoginToken {
        token,
        user_id: user_credentials.user_id,
        email: user_credentials.email,
    }))
}
