use friends_common::db::{self, DbAsyncPool};
use friends_common::graph::FriendRequestAction;
use friends_common::request_io::inputs::{InputFriendRequest, InputFriendRequestAction};
use friends_common::request_io::outputs::{OutputFriendRequest, OutputStatus};

use actix_web::{web, HttpResponse};
use std::borrow::Cow;
use uuid::Uuid;

use crate::env;
use crate::handlers::error::HttpErrorResponse;
use crate::middleware::auth::{Access, VerifiedToken};
use crate::middleware::FromBearerHeader;

pub async fn send_friend_request(
    db_async_pool: web::Data<DbAsyncPool>,
    user_access_token: VerifiedToken<Access, FromBearerHeader>,
    request_data: web::Json<InputFriendRequest>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let friend_dao = db::friend::Dao::new(&db_async_pool);
    let request = friend_dao
        .send_request(
            user_access_token.claims.user_id,
            request_data.to_user,
            env::CONF.friend_requests,
        )
        .await?;

    log::debug!(
        "User {} sent friend request {} to {}",
        request.from_user_id,
        request.id,
        request.to_user_id
    );

    Ok(HttpResponse::Created().json(OutputStatus::new("request sent")))
}

pub async fn respond_to_friend_request(
    db_async_pool: web::Data<DbAsyncPool>,
    user_access_token: VerifiedToken<Access, FromBearerHeader>,
    request_id: web::Path<Uuid>,
    action_data: web::Json<InputFriendRequestAction>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let friend_dao = db::friend::Dao::new(&db_async_pool);
    let action = friend_dao
        .respond_to_request(
            user_access_token.claims.user_id,
            request_id.into_inner(),
            action_data.action.as_deref(),
        )
        .await?;

    let status = match action {
        FriendRequestAction::Accept => "request accepted",
        FriendRequestAction::Reject => "request rejected",
    };

    Ok(HttpResponse::Ok().json(OutputStatus::new(status)))
}

pub async fn list_friends(
    db_async_pool: web::Data<DbAsyncPool>,
    user_access_token: VerifiedToken<Access, FromBearerHeader>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let friend_dao = db::friend::Dao::new(&db_async_pool);

    let friends = match friend_dao.get_friends(user_access_token.claims.user_id).await {
        Ok(f) => f,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(Cow::Borrowed(
                "Failed to get friends",
            )));
        }
    };

    Ok(HttpResponse::Ok().json(friends))
}

pub async fn list_pending_requests(
    db_async_pool: web::Data<DbAsyncPool>,
    user_access_token: VerifiedToken<Access, FromBearerHeader>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let friend_dao = db::friend::Dao::new(&db_async_pool);

    let requests = match friend_dao
        .get_pending_requests(user_access_token.claims.user_id)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(Cow::Borrowed(
                "Failed to get pending friend requests",
            )));
        }
    };

    let output = requests
        .into_iter()
        .map(OutputFriendRequest::from)
        .collect::<Vec<_>>();

    Ok(HttpResponse::Ok().json(output))
}
