use actix_web::web::*;

use crate::handlers::auth;

use super::RouteLimiters;

pub fn configure(cfg: &mut ServiceConfig, limiters: RouteLimiters) {
    cfg.service(
        resource("/login/")
            .route(post().to(auth::login))
            .wrap(limiters.login),
    );
}
