use actix_web::web::*;

use crate::handlers::user;

use super::RouteLimiters;

pub fn configure(cfg: &mut ServiceConfig, limiters: RouteLimiters) {
    cfg.service(
        resource("/register/")
            .route(post().to(user::register))
            .wrap(limiters.register),
    )
    .service(resource("/search/").route(get().to(user::search)));
}
