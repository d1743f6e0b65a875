pub mod auth;
pub mod friend;
pub mod health;
pub mod user;

pub mod credentials {
    use std::borrow::Cow;
    use std::str::FromStr;
    use tokio::sync::oneshot;
    use zeroize::Zeroizing;

    use super::error::HttpErrorResponse;
    use crate::env;

    /// Hashes on the rayon pool so actix workers are never blocked by argon2.
    pub async fn hash_password(password: Zeroizing<Vec<u8>>) -> Result<String, HttpErrorResponse> {
        let (sender, receiver) = oneshot::channel();

        rayon::spawn(move || {
            let hash_result = argon2_kdf::Hasher::default()
                .algorithm(argon2_kdf::Algorithm::Argon2id)
                .salt_length(env::CONF.hashing.salt_length)
                .hash_length(env::CONF.hashing.hash_length)
                .iterations(env::CONF.hashing.hash_iterations)
                .memory_cost_kib(env::CONF.hashing.hash_mem_cost_kib)
                .threads(env::CONF.hashing.hash_threads)
                .secret(argon2_kdf::Secret::using_bytes(&env::CONF.keys.hashing_key))
                .hash(&password)
                .map(|h| h.to_string());

            // The receiver only goes away if the request was dropped
            let _ = sender.send(hash_result);
        });

        match receiver.await? {
            Ok(hash) => Ok(hash),
            Err(e) => {
                log::error!("{e}");
                Err(HttpErrorResponse::InternalError(Cow::Borrowed(
                    "Failed to hash password",
                )))
            }
        }
    }

    pub async fn verify_password(
        password: Zeroizing<Vec<u8>>,
        hash: String,
    ) -> Result<bool, HttpErrorResponse> {
        let (sender, receiver) = oneshot::channel();

        rayon::spawn(move || {
            let result = argon2_kdf::Hash::from_str(&hash).map(|hash| {
                hash.verify_with_secret(
                    &password,
                    argon2_kdf::Secret::using_bytes(&env::CONF.keys.hashing_key),
                )
            });

            let _ = sender.send(result);
        });

        match receiver.await? {
            Ok(matches) => Ok(matches),
            Err(e) => {
                log::error!("{e}");
                Err(HttpErrorResponse::InternalError(Cow::Borrowed(
                    "Failed to validate password",
                )))
            }
        }
    }

}

pub mod error {
    use friends_common::graph::FriendGraphError;
    use friends_common::request_io::outputs::OutputError;
    use friends_common::token::TokenError;

    use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
    use actix_web::http::StatusCode;
    use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
    use std::borrow::Cow;
    use std::fmt;
    use tokio::sync::oneshot;

    const MAX_JSON_PAYLOAD_BYTES: usize = 8192;

    #[derive(Debug)]
    pub enum HttpErrorResponse {
        // 400
        IncorrectlyFormed(Cow<'static, str>),
        InvalidState(Cow<'static, str>),
        ConflictWithExisting(Cow<'static, str>),
        TooManyRequested(Cow<'static, str>),
        IncorrectCredential(Cow<'static, str>),

        // 401
        BadToken(Cow<'static, str>),
        TokenExpired(Cow<'static, str>),
        TokenMissing(Cow<'static, str>),
        WrongTokenType(Cow<'static, str>),

        // 403
        UserDisallowed(Cow<'static, str>),

        // 404
        DoesNotExist(Cow<'static, str>),

        // 413
        InputTooLarge(Cow<'static, str>),

        // 429
        TooManyRequests(Cow<'static, str>),

        // 500
        InternalError(Cow<'static, str>),
    }

    impl HttpErrorResponse {
        pub fn message(&self) -> &str {
            match self {
                HttpErrorResponse::IncorrectlyFormed(msg)
                | HttpErrorResponse::InvalidState(msg)
                | HttpErrorResponse::ConflictWithExisting(msg)
                | HttpErrorResponse::TooManyRequested(msg)
                | HttpErrorResponse::IncorrectCredential(msg)
                | HttpErrorResponse::BadToken(msg)
                | HttpErrorResponse::TokenExpired(msg)
                | HttpErrorResponse::TokenMissing(msg)
                | HttpErrorResponse::WrongTokenType(msg)
                | HttpErrorResponse::UserDisallowed(msg)
                | HttpErrorResponse::DoesNotExist(msg)
                | HttpErrorResponse::InputTooLarge(msg)
                | HttpErrorResponse::TooManyRequests(msg)
                | HttpErrorResponse::InternalError(msg) => msg,
            }
        }
    }

    impl std::error::Error for HttpErrorResponse {}

    impl fmt::Display for HttpErrorResponse {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}: {}", self.status_code(), self.message())
        }
    }

    impl actix_web::error::ResponseError for HttpErrorResponse {
        fn error_response(&self) -> HttpResponse {
            HttpResponseBuilder::new(self.status_code()).json(OutputError {
                error: String::from(self.message()),
            })
        }

        fn status_code(&self) -> StatusCode {
            match *self {
                HttpErrorResponse::IncorrectlyFormed(_)
                | HttpErrorResponse::InvalidState(_)
                | HttpErrorResponse::ConflictWithExisting(_)
                | HttpErrorResponse::TooManyRequested(_)
                | HttpErrorResponse::IncorrectCredential(_) => StatusCode::BAD_REQUEST,
                HttpErrorResponse::BadToken(_)
                | HttpErrorResponse::TokenExpired(_)
                | HttpErrorResponse::TokenMissing(_)
                | HttpErrorResponse::WrongTokenType(_) => StatusCode::UNAUTHORIZED,
                HttpErrorResponse::UserDisallowed(_) => StatusCode::FORBIDDEN,
                HttpErrorResponse::DoesNotExist(_) => StatusCode::NOT_FOUND,
                HttpErrorResponse::InputTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                HttpErrorResponse::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
                HttpErrorResponse::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl From<oneshot::error::RecvError> for HttpErrorResponse {
        fn from(_err: oneshot::error::RecvError) -> Self {
            HttpErrorResponse::InternalError(Cow::Borrowed("Rayon thread pool failure"))
        }
    }

    impl From<TokenError> for HttpErrorResponse {
        fn from(err: TokenError) -> Self {
            match err {
                TokenError::TokenInvalid => HttpErrorResponse::BadToken(Cow::Borrowed(
                    "Invalid token",
                )),
                TokenError::TokenExpired => HttpErrorResponse::TokenExpired(Cow::Borrowed(
                    "Token expired",
                )),
                TokenError::TokenMissing => HttpErrorResponse::TokenMissing(Cow::Borrowed(
                    "Authentication credentials were not provided",
                )),
                TokenError::WrongTokenType => HttpErrorResponse::WrongTokenType(Cow::Borrowed(
                    "Wrong token type",
                )),
            }
        }
    }

    impl From<FriendGraphError> for HttpErrorResponse {
        fn from(err: FriendGraphError) -> Self {
            let msg = Cow::Owned(err.to_string());

            match err {
                FriendGraphError::SelfRequest => HttpErrorResponse::InvalidState(msg),
                FriendGraphError::RecipientNotFound => HttpErrorResponse::DoesNotExist(msg),
                FriendGraphError::DuplicateRequest => HttpErrorResponse::ConflictWithExisting(msg),
                FriendGraphError::RateLimited(_) => HttpErrorResponse::TooManyRequested(msg),
                FriendGraphError::RequestNotFound => HttpErrorResponse::DoesNotExist(msg),
                FriendGraphError::Forbidden => HttpErrorResponse::UserDisallowed(msg),
                FriendGraphError::InvalidAction => HttpErrorResponse::IncorrectlyFormed(msg),
                FriendGraphError::Store(e) => {
                    log::error!("{e}");
                    HttpErrorResponse::InternalError(Cow::Borrowed(
                        "Failed to update friend requests",
                    ))
                }
            }
        }
    }

    pub fn json_config() -> web::JsonConfig {
        web::JsonConfig::default()
            .limit(MAX_JSON_PAYLOAD_BYTES)
            .error_handler(json_error_handler)
    }

    pub fn path_config() -> web::PathConfig {
        web::PathConfig::default().error_handler(path_error_handler)
    }

    pub fn query_config() -> web::QueryConfig {
        web::QueryConfig::default().error_handler(query_error_handler)
    }

    fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
        match err {
            JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
                HttpErrorResponse::InputTooLarge(Cow::Borrowed("Request body is too large"))
                    .into()
            }
            e => HttpErrorResponse::IncorrectlyFormed(Cow::Owned(format!(
                "Incorrectly formed request: {e}"
            )))
            .into(),
        }
    }

    fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
        HttpErrorResponse::IncorrectlyFormed(Cow::Owned(format!(
            "Incorrectly formed request: {err}"
        )))
        .into()
    }

    fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
        HttpErrorResponse::IncorrectlyFormed(Cow::Owned(format!(
            "Incorrectly formed request: {err}"
        )))
        .into()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        use actix_web::body::to_bytes;
        use actix_web::ResponseError;
        use friends_common::graph::RequestRateLimit;

        async fn body_of(err: HttpErrorResponse) -> (StatusCode, serde_json::Value) {
            let resp = err.error_response();
            let status = resp.status();
            let body = to_bytes(resp.into_body()).await.unwrap();

            (status, serde_json::from_slice(&body).unwrap())
        }

        #[actix_web::test]
        async fn test_friend_graph_error_mapping() {
            let cases = [
                (
                    FriendGraphError::SelfRequest,
                    StatusCode::BAD_REQUEST,
                    "You cannot send a friend request to yourself.",
                ),
                (
                    FriendGraphError::RecipientNotFound,
                    StatusCode::NOT_FOUND,
                    "User not found.",
                ),
                (
                    FriendGraphError::DuplicateRequest,
                    StatusCode::BAD_REQUEST,
                    "A friend request is already sent to this user and is pending.",
                ),
                (
                    FriendGraphError::RateLimited(RequestRateLimit::default()),
                    StatusCode::BAD_REQUEST,
                    "You cannot send more than 3 friend requests within a minute.",
                ),
                (
                    FriendGraphError::RequestNotFound,
                    StatusCode::NOT_FOUND,
                    "Friend request ID not found.",
                ),
                (
                    FriendGraphError::Forbidden,
                    StatusCode::FORBIDDEN,
                    "You are not authorized to accept or reject this friend request.",
                ),
                (
                    FriendGraphError::InvalidAction,
                    StatusCode::BAD_REQUEST,
                    "Action must be either 'accept' or 'reject'.",
                ),
            ];

            for (err, expected_status, expected_msg) in cases {
                let (status, body) = body_of(HttpErrorResponse::from(err)).await;
                assert_eq!(status, expected_status);
                assert_eq!(body["error"], expected_msg);
            }
        }

        #[actix_web::test]
        async fn test_store_errors_are_internal() {
            let err = FriendGraphError::Store(diesel::result::Error::NotFound.into());
            let (status, body) = body_of(HttpErrorResponse::from(err)).await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["error"], "Failed to update friend requests");
        }

        #[actix_web::test]
        async fn test_token_error_mapping() {
            for err in [
                TokenError::TokenInvalid,
                TokenError::TokenExpired,
                TokenError::TokenMissing,
                TokenError::WrongTokenType,
            ] {
                let (status, body) = body_of(HttpErrorResponse::from(err)).await;
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert!(body["error"].is_string());
            }
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use friends_common::db::{self, create_db_async_pool, DbAsyncPool};
    use friends_common::models::user::UserProfile;
    use friends_common::token::auth_token::{AuthToken, AuthTokenType, NewAuthTokenClaims};

    use actix_web::web::{Data, ServiceConfig};
    use diesel_async::pooled_connection::bb8::Pool;
    use diesel_async::pooled_connection::AsyncDieselConnectionManager;
    use diesel_async::AsyncPgConnection;
    use uuid::Uuid;

    use crate::env;
    use crate::handlers::error;
    use crate::services::api::RouteLimiters;

    /// A pool that never connects until a connection is requested, for tests that fail before
    /// reaching the database.
    pub fn lazy_db_pool() -> DbAsyncPool {
        let manager =
            AsyncDieselConnectionManager::<AsyncPgConnection>::new(env::CONF.db.database_uri.as_str());
        Pool::builder().max_size(1).build_unchecked(manager)
    }

    pub async fn db_pool() -> DbAsyncPool {
        create_db_async_pool(&env::CONF.db.database_uri, 4, env::CONF.db.idle_timeout)
            .await
            .expect("Failed to create async DB pool for tests")
    }

    pub fn configure_app(db_async_pool: DbAsyncPool) -> impl FnOnce(&mut ServiceConfig) {
        move |cfg| {
            cfg.app_data(Data::new(db_async_pool))
                .app_data(error::json_config())
                .app_data(error::path_config())
                .app_data(error::query_config());

            crate::services::api::configure(cfg, RouteLimiters::default());
        }
    }

    pub fn access_token(user_id: Uuid, user_email: &str) -> String {
        let claims = NewAuthTokenClaims::expiring_in(
            user_id,
            user_email,
            AuthTokenType::Access,
            env::CONF.lifetimes.access_token_lifetime,
        );

        AuthToken::sign_new(claims, &env::CONF.keys.token_signing_key).unwrap()
    }

    pub fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {token}"))
    }

    pub async fn create_user(db_async_pool: &DbAsyncPool) -> (UserProfile, String) {
        let user_number = rand::random::<u64>();
        let email = format!("test_user{user_number}@test.com");

        let user = db::user::Dao::new(db_async_pool)
            .create_user(&format!("user{user_number}"), &email, "unused_hash")
            .await
            .unwrap();

        let token = access_token(user.id, &user.email);
        (user, token)
    }

    pub async fn delete_user(db_async_pool: &DbAsyncPool, user_id: Uuid) {
        use diesel::QueryDsl;
        use diesel_async::RunQueryDsl;
        use friends_common::schema::users::dsl::users;

        let mut conn = db_async_pool.get().await.unwrap();
        let _ = diesel::delete(users.find(user_id)).execute(&mut conn).await;
    }
}
