//! Adaptive per-domain rate limiter.
//!
//! Spaces requests to the same host by a configured delay. Backs off on
//! 429/503 and gradually recovers after a run of successes.

mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use domain_state::DomainState;

/// Rate limiter tuning.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub recovery_multiplier: f64,
    /// Successes needed before the delay is reduced again.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.8,
            recovery_threshold: 5,
        }
    }
}

impl RateLimitConfig {
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: base_delay.max(Duration::from_secs(60)),
            ..Self::default()
        }
    }
}

/// Per-domain rate limiter shared by all requests of a client.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Arc<RwLock<HashMap<String, DomainState>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Create a new rate limiter with default config.
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a new rate limiter with custom config.
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Extract domain from URL.
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    /// Wait for this domain's next slot. Returns the domain, if the URL has one.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        let slot = {
            let mut domains = self.domains.write().await;
            domains
                .entry(domain.clone())
                .or_insert_with(|| DomainState::new(self.config.base_delay))
                .reserve(Instant::now())
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!("Rate limiting {}: waiting {:?}", domain, wait);
            tokio::time::sleep(wait).await;
        }

        Some(domain)
    }

    /// Report a successful request - may decrease delay.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        let Some(state) = domains.get_mut(domain) else {
            return;
        };

        state.consecutive_successes += 1;
        if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
            let reduced = state.current_delay.mul_f64(self.config.recovery_multiplier);
            state.consecutive_successes = 0;

            if reduced <= self.config.base_delay {
                state.in_backoff = false;
                state.current_delay = self.config.base_delay;
                info!("Domain {} recovered from rate limit backoff", domain);
            } else {
                state.current_delay = reduced;
                debug!("Domain {} delay reduced to {:?}", domain, reduced);
            }
        }
    }

    /// Check if a status code is a rate limit signal.
    pub fn is_rate_limit(status_code: u16) -> bool {
        matches!(status_code, 429 | 503)
    }

    /// Report a rate limit hit (429 or 503) - increases delay.
    pub async fn report_rate_limit(&self, domain: &str, status_code: u16) {
        let mut domains = self.domains.write().await;
        let Some(state) = domains.get_mut(domain) else {
            return;
        };

        state.rate_limit_hits += 1;
        state.consecutive_successes = 0;
        state.in_backoff = true;

        let floor = self.config.base_delay.max(Duration::from_millis(100));
        let increased = state
            .current_delay
            .max(floor)
            .mul_f64(self.config.backoff_multiplier);
        state.current_delay = increased.min(self.config.max_delay);

        warn!(
            "Rate limited by {} (HTTP {}, {} of {} requests), backing off to {:?}",
            domain, status_code, state.rate_limit_hits, state.total_requests, state.current_delay
        );
    }

    /// Current delay for a domain, if it has been seen.
    pub async fn current_delay(&self, domain: &str) -> Option<Duration> {
        let domains = self.domains.read().await;
        domains.get(domain).map(|s| s.current_delay)
    }
}
