use std::{
    borrow::Cow,
    collections::HashMap,
    future::{ready, Ready},
    net::IpAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use futures::future::LocalBoxFuture;

use crate::handlers::error::HttpErrorResponse;

const TABLE_COUNT: usize = 16;

#[derive(Debug)]
struct LimiterEntry {
    count: u64,
    first_access: Instant,
}

struct LimiterTable {
    map: HashMap<IpAddr, LimiterEntry>,
    last_clear: Instant,
}

impl LimiterTable {
    fn new() -> Self {
        LimiterTable {
            map: HashMap::new(),
            last_clear: Instant::now(),
        }
    }

    /// Records a hit from `ip` and reports whether it is within the limit.
    fn check_and_record(
        &mut self,
        ip: IpAddr,
        now: Instant,
        max_per_period: u64,
        period: Duration,
        clear_frequency: Duration,
    ) -> bool {
        if now.duration_since(self.last_clear) > clear_frequency {
            self.map.clear();
            self.map.shrink_to_fit();
            self.last_clear = now;
        }

        let entry = self.map.entry(ip).or_insert(LimiterEntry {
            count: 0,
            first_access: now,
        });

        if now.duration_since(entry.first_access) > period {
            entry.first_access = now;
            entry.count = 0;
        }

        if entry.count >= max_per_period {
            return false;
        }

        entry.count += 1;
        true
    }
}

/// Fixed-window request limiter keyed by client IP. Clients are spread across 16 tables by the
/// low bits of the final address octet so that unrelated clients rarely contend for a lock.
#[derive(Clone)]
pub struct Limiter {
    max_per_period: u64,
    period: Duration,
    clear_frequency: Duration,
    limiter_tables: Arc<[Mutex<LimiterTable>; TABLE_COUNT]>,
}

impl Limiter {
    /// Panics if period is greater than clear frequency.
    pub fn new(max_per_period: u64, period: Duration, clear_frequency: Duration) -> Self {
        if period > clear_frequency {
            panic!("Period cannot be greater than clear frequency");
        }

        Limiter {
            max_per_period,
            period,
            clear_frequency,
            limiter_tables: Arc::new(std::array::from_fn(|_| Mutex::new(LimiterTable::new()))),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Limiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = LimiterMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct LimiterMiddleware<S> {
    service: S,
    limiter: Limiter,
}

impl<S> LimiterMiddleware<S> {
    fn client_ip(req: &ServiceRequest) -> Option<IpAddr> {
        #[cfg(test)]
        {
            if let Some(test_ip) = req.headers().get("test-ip") {
                return test_ip.to_str().ok()?.parse().ok();
            }

            if req.peer_addr().is_none() {
                return Some(IpAddr::from([127, 0, 0, 1]));
            }
        }

        req.peer_addr().map(|addr| addr.ip())
    }

    fn is_allowed(&self, ip: IpAddr) -> bool {
        let final_octet = match ip {
            IpAddr::V4(ip) => ip.octets()[3],
            IpAddr::V6(ip) => ip.octets()[15],
        };

        let table = &self.limiter.limiter_tables[(final_octet & 0x0F) as usize];
        let mut table = match table.lock() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        };

        table.check_and_record(
            ip,
            Instant::now(),
            self.limiter.max_per_period,
            self.limiter.period,
            self.limiter.clear_frequency,
        )
    }
}

impl<S, B> Service<ServiceRequest> for LimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(ip) = Self::client_ip(&req) {
            if !self.is_allowed(ip) {
                log::info!("Limiter rejected request to {} from {ip}", req.path());

                return Box::pin(ready(Err(HttpErrorResponse::TooManyRequests(
                    Cow::Borrowed("Too many requests. Please try again later."),
                )
                .into())));
            }
        }

        Box::pin(self.service.call(req))
    }
}
