pub mod auth;

mod limiter;

pub use limiter::Limiter;

use actix_web::http::header;
use actix_web::HttpRequest;

pub trait TokenLocation {
    fn get_from_request(req: &HttpRequest) -> Option<&str>;
}

/// `Authorization: Bearer <token>`. The `Token` scheme is accepted as well.
#[derive(Debug)]
pub struct FromBearerHeader {}

impl TokenLocation for FromBearerHeader {
    fn get_from_request(req: &HttpRequest) -> Option<&str> {
        let header = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = header.trim().split_once(' ')?;

        if !scheme.eq_ignore_ascii_case("Bearer") && !scheme.eq_ignore_ascii_case("Token") {
            return None;
        }

        let token = token.trim();

        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }
}
