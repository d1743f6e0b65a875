use std::time::Duration;

use actix_web::web::*;

use crate::middleware::Limiter;

mod auth;
mod friend;
mod health;
mod user;

#[derive(Clone)]
pub struct RouteLimiters {
    pub register: Limiter,
    pub login: Limiter,
}

impl Default for RouteLimiters {
    fn default() -> Self {
        const CLEAR_FREQUENCY: Duration = Duration::from_secs(3600 * 24);

        Self {
            register: Limiter::new(5, Duration::from_secs(1200), CLEAR_FREQUENCY),
            login: Limiter::new(10, Duration::from_secs(60), CLEAR_FREQUENCY),
        }
    }
}

pub fn configure(cfg: &mut ServiceConfig, limiters: RouteLimiters) {
    cfg.service(
        scope("/api")
            .configure(|cfg| auth::configure(cfg, limiters.clone()))
            .configure(friend::configure)
            .configure(health::configure)
            .configure(|cfg| user::configure(cfg, limiters)),
    );
}
