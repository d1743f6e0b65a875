use friends_common::db::{self, DbAsyncPool};

use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

use crate::env;

const DB_PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Deserialize)]
pub struct HealthKeyQuery {
    pub key: Option<String>,
}

pub async fn heartbeat() -> impl Responder {
    HttpResponse::Ok()
}

/// Reports whether the database answers a query, how long it took and the pool occupancy,
/// along with the friend-request limit currently in force. Responds 503 if the database cannot
/// be reached within [`DB_PING_TIMEOUT`].
pub async fn health(
    db_async_pool: web::Data<DbAsyncPool>,
    query: web::Query<HealthKeyQuery>,
) -> impl Responder {
    let key_matches = query
        .key
        .as_deref()
        .is_some_and(|k| keys_match(k.as_bytes(), env::CONF.health_endpoint_key.as_bytes()));

    if !key_matches {
        return HttpResponse::Unauthorized().finish();
    }

    let started = Instant::now();
    let ping_error = match tokio::time::timeout(DB_PING_TIMEOUT, db::ping(&db_async_pool)).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(String::from("Timed out waiting for the database")),
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if let Some(e) = &ping_error {
        log::warn!("Health check could not reach the database: {e}");
    }

    let pool_state = db_async_pool.state();
    let limit = env::CONF.friend_requests;

    let body = json!({
        "database": {
            "reachable": ping_error.is_none(),
            "round_trip_ms": elapsed_ms,
            "connections": pool_state.connections,
            "idle_connections": pool_state.idle_connections,
        },
        "friend_requests": {
            "max_requests": limit.max_requests,
            "window_secs": limit.window.as_secs(),
        },
    });

    if ping_error.is_none() {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

/// Every byte is examined once the lengths agree, so the time taken does not reveal where the
/// first mismatch is.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    if provided.is_empty() || provided.len() != expected.len() {
        return false;
    }

    provided
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::App;

    use crate::handlers::test_utils;

    #[test]
    fn test_keys_match() {
        assert!(keys_match(b"test-health-key", b"test-health-key"));

        assert!(!keys_match(b"test-health-kez", b"test-health-key"));
        assert!(!keys_match(b"Test-health-key", b"test-health-key"));
        assert!(!keys_match(b"test-health", b"test-health-key"));
        assert!(!keys_match(b"test-health-key!", b"test-health-key"));
        assert!(!keys_match(b"", b""));
    }

    #[actix_web::test]
    async fn test_heartbeat() {
        let app = test::init_service(
            App::new().configure(test_utils::configure_app(test_utils::lazy_db_pool())),
        )
        .await;

        let req = TestRequest::get().uri("/api/heartbeat").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_health_rejects_bad_keys() {
        let app = test::init_service(
            App::new().configure(test_utils::configure_app(test_utils::lazy_db_pool())),
        )
        .await;

        let wrong_key = format!("{}x", env::CONF.health_endpoint_key.as_str());

        for uri in [
            String::from("/api/health"),
            String::from("/api/health?key="),
            String::from("/api/health?key=short"),
            format!("/api/health?key={wrong_key}"),
        ] {
            let req = TestRequest::get().uri(&uri).to_request();
            let resp = test::call_service(&app, req).await;

            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[actix_web::test]
    async fn test_health_reports_database_and_limit() {
        let app = test::init_service(
            App::new().configure(test_utils::configure_app(test_utils::lazy_db_pool())),
        )
        .await;

        let req = TestRequest::get()
            .uri(&format!(
                "/api/health?key={}",
                env::CONF.health_endpoint_key.as_str()
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();

        let body: serde_json::Value = test::read_body_json(resp).await;
        let reachable = body["database"]["reachable"].as_bool().unwrap();

        // Whether a database is running depends on the environment; the status must agree with it
        if reachable {
            assert_eq!(status, StatusCode::OK);
        } else {
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        }

        assert!(body["database"]["round_trip_ms"].is_u64());
        assert!(body["database"]["connections"].is_u64());
        assert!(body["database"]["idle_connections"].is_u64());
        assert_eq!(
            body["friend_requests"]["max_requests"],
            env::CONF.friend_requests.max_requests
        );
        assert_eq!(
            body["friend_requests"]["window_secs"],
            env::CONF.friend_requests.window.as_secs()
        );
    }

    #[actix_web::test]
    #[ignore]
    async fn test_health_with_database() {
        let pool = test_utils::db_pool().await;
        let app = test::init_service(App::new().configure(test_utils::configure_app(pool))).await;

        let req = TestRequest::get()
            .uri(&format!(
                "/api/health?key={}",
                env::CONF.health_endpoint_key.as_str()
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["database"]["reachable"], true);
    }
}
