use friends_common::db::{self, DbAsyncPool};
use friends_common::request_io::inputs::{InputSearchQuery, InputUser};
use friends_common::validators::{self, Validity};

use actix_web::{web, HttpResponse};
use std::borrow::Cow;
use zeroize::Zeroizing;

use crate::handlers::credentials;
use crate::handlers::error::HttpErrorResponse;

pub async fn register(
    db_async_pool: web::Data<DbAsyncPool>,
    user_data: web::Json<InputUser>,
) -> Result<HttpResponse, HttpErrorResponse> {
    if let Validity::Invalid(msg) = validators::validate_username(&user_data.username) {
        return Err(HttpErrorResponse::IncorrectlyFormed(Cow::Borrowed(msg)));
    }

    if let Validity::Invalid(msg) = validators::validate_email_address(&user_data.email) {
        return Err(HttpErrorResponse::IncorrectlyFormed(Cow::Borrowed(msg)));
    }

    if let Validity::Invalid(msg) = validators::validate_password(&user_data.password) {
        return Err(HttpErrorResponse::IncorrectlyFormed(Cow::Borrowed(msg)));
    }

    let password = Zeroizing::new(Vec::from(user_data.password.as_bytes()));
    let auth_string_hash = credentials::hash_password(password).await?;

    let user_dao = db::user::Dao::new(&db_async_pool);
    let user = match user_dao
        .create_user(&user_data.username, &user_data.email, &auth_string_hash)
        .await
    {
        Ok(u) => u,
        Err(e) if e.is_unique_violation() => {
            return Err(HttpErrorResponse::ConflictWithExisting(Cow::Borrowed(
                "A user with that email already exists.",
            )));
        }
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(Cow::Borrowed(
                "Failed to create user",
            )));
        }
    };

    log::info!("Registered user {}", user.id);

    Ok(HttpResponse::Created().json(user))
}

pub async fn search(
    db_async_pool: web::Data<DbAsyncPool>,
    query: web::Query<InputSearchQuery>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let user_dao = db::user::Dao::new(&db_async_pool);

    let matches = match user_dao.search_users(&query.q).await {
        Ok(m) => m,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(Cow::Borrowed(
                "Failed to search users",
            )));
        }
    };

    Ok(HttpResponse::Ok().json(matches))
}
