//! Token bucket rate limiter for outbound tracking requests.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Rate limit status snapshot.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub requests_per_minute: u32,
    pub tokens_available: f32,
    pub next_available_in_ms: Option<u64>,
}

/// Token bucket rate limiter.
///
/// Tokens are added at a constant rate and consumed when requests are made.
/// If no tokens are available, the request must wait.
#[derive(Debug)]
pub struct TokenBucket {
    /// Max tokens (= requests per minute).
    capacity: f32,
    /// Current available tokens.
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    /// Last refill time.
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a new token bucket with the given rate limit.
    ///
    /// The bucket starts full, allowing immediate requests up to the capacity.
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1) as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Try to acquire a token.
    ///
    /// Returns `Err(wait_duration)` if rate limited.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f32(tokens_needed / self.refill_rate))
        }
    }

    pub fn status(&mut self) -> RateLimitStatus {
        self.refill();
        RateLimitStatus {
            requests_per_minute: self.capacity as u32,
            tokens_available: self.tokens,
            next_available_in_ms: if self.tokens >= 1.0 {
                None
            } else {
                let tokens_needed = 1.0 - self.tokens;
                Some((tokens_needed / self.refill_rate * 1000.0) as u64)
            },
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Async wrapper around a [`TokenBucket`] that waits for a token instead of failing.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(requests_per_minute)),
        }
    }

    /// Wait until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                match bucket.try_acquire() {
                    Ok(()) => return,
                    Err(wait) => wait,
                }
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Tracking rate limit reached");
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        self.bucket.lock().await.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bucket_new() {
        let bucket = TokenBucket::new(10);
        assert_eq!(bucket.capacity, 10.0);
        assert_eq!(bucket.tokens, 10.0);
        assert!((bucket.refill_rate - 10.0 / 60.0).abs() < 0.001);
    }

    #[test]
    fn test_zero_rpm_is_clamped() {
        let bucket = TokenBucket::new(0);
        assert_eq!(bucket.capacity, 1.0);
    }

    #[test]
    fn test_token_bucket_drains() {
        let mut bucket = TokenBucket::new(10);
        for _ in 0..10 {
            assert!(bucket.try_acquire().is_ok());
        }

        let wait = bucket.try_acquire().unwrap_err();
        // At 10 rpm, 1 token takes 6 seconds to refill
        assert!(wait.as_secs() <= 6);
        assert!(wait.as_millis() > 0);
    }

    #[test]
    fn test_token_bucket_status() {
        let mut bucket = TokenBucket::new(10);
        let status = bucket.status();
        assert_eq!(status.requests_per_minute, 10);
        assert!(status.next_available_in_ms.is_none());

        for _ in 0..10 {
            bucket.try_acquire().unwrap();
        }
        let status = bucket.status();
        assert!(status.tokens_available < 1.0);
        assert!(status.next_available_in_ms.is_some());
    }

    #[tokio::test]
    async fn test_rate_limiter_waits_for_refill() {
        let limiter = RateLimiter::new(600); // 10 tokens per second
        for _ in 0..600 {
            limiter.acquire().await;
        }

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));

        let status = limiter.status().await;
        assert_eq!(status.requests_per_minute, 600);
    }
}
