use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Extensions, HeaderMap},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use crate::error::AppError;

/// Rate limiter keyed by client IP.
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// A limiter plus the policy for resolving the client address it keys on.
#[derive(Clone)]
pub struct IpRateLimit {
    limiter: IpRateLimiter,
    trust_forwarded_for: bool,
}

impl IpRateLimit {
    /// `trust_forwarded_for` should only be set behind a proxy that
    /// overwrites `x-forwarded-for`; otherwise clients can pick their own key.
    pub fn new(limiter: IpRateLimiter, trust_forwarded_for: bool) -> Self {
        Self {
            limiter,
            trust_forwarded_for,
        }
    }
}

/// Allows `attempts` requests per `window_seconds` per IP, refilling evenly
/// across the window. Zero values are clamped to one.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let attempts = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
    let window_ms = window_seconds.max(1) * 1000;
    let period = Duration::from_millis((window_ms / u64::from(attempts.get())).max(1));

    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(attempts);

    Arc::new(RateLimiter::dashmap(quota))
}

/// Client address: the first `x-forwarded-for` hop when the proxy is
/// trusted, otherwise the socket peer only.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trust_forwarded_for: bool,
) -> Option<IpAddr> {
    let forwarded = trust_forwarded_for
        .then(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .flatten();

    forwarded.or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

pub fn client_ip(request: &Request, trust_forwarded_for: bool) -> Option<IpAddr> {
    resolve_client_ip(request.headers(), request.extensions(), trust_forwarded_for)
}

pub async fn ip_rate_limit_middleware(
    State(limit): State<IpRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ip) = client_ip(&request, limit.trust_forwarded_for) else {
        tracing::warn!("Could not determine IP for rate limiting");
        return Ok(next.run(request).await);
    };

    match limit.limiter.check_key(&ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(negative) => {
            let wait_time = negative.wait_time_from(DefaultClock::default().now());
            tracing::warn!(%ip, retry_after = wait_time.as_secs(), "Rate limit exceeded");
            Err(AppError::TooManyRequests(
                "Too many requests from this IP. Please try again later.".to_string(),
                Some(wait_time.as_secs().max(1)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_burst_then_blocks() {
        let limiter = create_ip_rate_limiter(3, 60);
        let ip: IpAddr = "10.1.2.3".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.check_key(&ip).is_ok());
        }
        assert!(limiter.check_key(&ip).is_err());

        let other: IpAddr = "10.1.2.4".parse().unwrap();
        assert!(limiter.check_key(&other).is_ok());
    }

    fn forwarded_request() -> Request {
        let peer: SocketAddr = "198.51.100.4:5000".parse().unwrap();
        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[test]
    fn forwarded_for_wins_over_peer_behind_trusted_proxy() {
        let request = forwarded_request();
        assert_eq!(client_ip(&request, true), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn forwarded_for_is_ignored_without_trusted_proxy() {
        let request = forwarded_request();
        assert_eq!(client_ip(&request, false), Some("198.51.100.4".parse().unwrap()));

        let bare = Request::builder()
            .header("x-forwarded-for", "203.0.113.9")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_ip(&bare, false), None);
    }
}
