use actix_web::web::*;

use crate::handlers::friend;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(resource("/friend-request/").route(post().to(friend::send_friend_request)))
        .service(
            resource("/friend-request/{request_id}/")
                .route(put().to(friend::respond_to_friend_request)),
        )
        .service(resource("/friends/").route(get().to(friend::list_friends)))
        .service(resource("/pending-requests/").route(get().to(friend::list_pending_requests)));
}
