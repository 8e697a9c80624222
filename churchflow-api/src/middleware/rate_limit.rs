/// Rate limiting for public form submissions
///
/// Token bucket per client IP, held in memory. Each submission consumes one
/// token; the bucket refills continuously at `per_minute / 60` tokens per
/// second up to `per_minute`.
///
/// The client is the peer IP from connect info. With `TRUST_FORWARDED_FOR`
/// set, the last `X-Forwarded-For` hop (the one the proxy appended) is used
/// instead; earlier hops are client-supplied and ignored.
///
/// At most `max_clients` buckets are held. Idle buckets are pruned first,
/// then the least recently used ones are evicted.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: bucket capacity
/// - `X-RateLimit-Remaining`: whole tokens left
/// - `Retry-After`: seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Buckets untouched this long are full again and can be dropped
const IDLE_BUCKET: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub requests_per_minute: u32,

    /// Tokens per second
    pub refill_rate: f64,

    pub bucket_capacity: u32,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        RateLimit {
            requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self, count: f64) -> bool {
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    fn seconds_until_available(&self, count: f64, rate: f64) -> u64 {
        let deficit = count - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub ok: bool,
    pub remaining: u32,

    /// Seconds until the next token
    pub retry_after: u64,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    max_clients: usize,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            max_clients: MAX_TRACKED_CLIENTS,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients.max(1);
        self
    }

    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::new(RateLimit::per_minute(requests_per_minute))
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    pub fn tracked_clients(&self) -> usize {
        match self.buckets.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitResult {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
        let limit = self.limit;
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if buckets.len() >= self.max_clients && !buckets.contains_key(key) {
            buckets.retain(|_, b| now.saturating_duration_since(b.last_refill) < IDLE_BUCKET);
            while buckets.len() >= self.max_clients {
                let oldest = buckets
                    .iter()
                    .min_by_key(|(_, b)| b.last_refill)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        buckets.remove(&k);
                    }
                    None => break,
                }
            }
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(limit.bucket_capacity, now));
        bucket.refill(limit.refill_rate, limit.bucket_capacity, now);

        if bucket.try_consume(1.0) {
            RateLimitResult {
                ok: true,
                remaining: bucket.tokens.floor() as u32,
                retry_after: 0,
            }
        } else {
            RateLimitResult {
                ok: false,
                remaining: 0,
                retry_after: bucket.seconds_until_available(1.0, limit.refill_rate).max(1),
            }
        }
    }
}

/// Client key: the peer IP, or the proxy-appended hop when forwarded
/// headers are trusted
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| {
            headers
                .get_all("X-Forwarded-For")
                .iter()
                .filter_map(|v| v.to_str().ok())
                .flat_map(|v| v.split(','))
                .last()
                .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
        })
        .flatten();

    forwarded
        .or_else(|| peer.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware for public submission routes
///
/// # Errors
///
/// - 429 Too Many Requests with `Retry-After` when the bucket is empty
pub async fn public_rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.config.api.trust_forwarded_for);

    let limiter = &state.public_limiter;
    let result = limiter.check(&key);

    if !result.ok {
        tracing::warn!(client = %key, retry_after = result.retry_after, "Public submission rate limited");
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Too many submissions. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(limiter.limit().requests_per_minute),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_per_minute() {
        let limit = RateLimit::per_minute(10);
        assert_eq!(limit.bucket_capacity, 10);
        assert!((limit.refill_rate - 0.1667).abs() < 0.001);

        assert_eq!(RateLimit::per_minute(0).requests_per_minute, 1);
    }

    #[test]
    fn test_bucket_exhausts_and_refills() {
        let limiter = RateLimiter::per_minute(3);
        let start = Instant::now();

        for remaining in [2, 1, 0] {
            let result = limiter.check_at("1.2.3.4", start);
            assert!(result.ok);
            assert_eq!(result.remaining, remaining);
        }

        let blocked = limiter.check_at("1.2.3.4", start);
        assert!(!blocked.ok);
        assert_eq!(blocked.retry_after, 20);

        assert!(limiter.check_at("1.2.3.4", start + Duration::from_secs(20)).ok);
    }

    #[test]
    fn test_clients_have_separate_buckets() {
        let limiter = RateLimiter::per_minute(1);
        let now = Instant::now();

        assert!(limiter.check_at("a", now).ok);
        assert!(!limiter.check_at("a", now).ok);
        assert!(limiter.check_at("b", now).ok);
    }

    #[test]
    fn test_client_key_uses_peer_by_default() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer), false), "10.0.0.9");
        assert_eq!(client_key(&headers, None, false), "unknown");

        headers.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.5"));
        assert_eq!(client_key(&headers, Some(peer), false), "10.0.0.9");
    }

    #[test]
    fn test_client_key_behind_trusted_proxy() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();

        // the client wrote the first hop, the proxy appended the second
        headers.insert("X-Forwarded-For", HeaderValue::from_static("1.1.1.1, 203.0.113.5"));
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.5");

        headers.insert("X-Forwarded-For", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_key(&headers, Some(peer), true), "10.0.0.9");
    }

    #[test]
    fn test_rotating_forwarded_header_shares_one_bucket() {
        let limiter = RateLimiter::per_minute(1);
        let peer: SocketAddr = "198.51.100.7:40000".parse().unwrap();
        let now = Instant::now();

        let mut accepted = 0;
        for n in 0..500 {
            let mut headers = HeaderMap::new();
            let spoofed = format!("10.{}.{}.1", n / 256, n % 256);
            headers.insert("X-Forwarded-For", HeaderValue::from_str(&spoofed).unwrap());
            if limiter.check_at(&client_key(&headers, Some(peer), false), now).ok {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_bucket_map_is_capped() {
        let limiter = RateLimiter::per_minute(1).with_max_clients(100);
        let now = Instant::now();

        for n in 0..1_000 {
            limiter.check_at(&format!("client-{}", n), now + Duration::from_millis(n));
            assert!(limiter.tracked_clients() <= 100);
        }

        // the most recent client survives eviction
        assert!(!limiter.check_at("client-999", now + Duration::from_millis(1_000)).ok);
    }
}
