use std::time::Duration;

/// Everything resilience-related about one downstream, fixed at startup.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Failures within the breaker window that open the circuit.
    pub failure_threshold: usize,
    /// Consecutive half-open successes that close the circuit.
    pub success_threshold: usize,
    /// Breaker outcome window size.
    pub window_size: usize,
    /// How long an open circuit waits before allowing a probe.
    pub open_timeout: Duration,
    /// Retries after the initial attempt.
    pub max_retries: usize,
    /// First backoff delay.
    pub base_delay: Duration,
    /// Backoff cap.
    pub max_delay: Duration,
    /// Backoff growth factor.
    pub exp_base: f64,
    /// Whether to jitter the backoff.
    pub jitter_enabled: bool,
    /// Response statuses treated as attempt failures (and thus retried).
    pub retry_status_set: Vec<u16>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// How long an attempt waits for an in-flight slot before failing with a
    /// pool timeout.
    pub pool_timeout: Duration,
    /// Bound on concurrent in-flight requests to this downstream.
    pub max_in_flight: Option<usize>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            window_size: 100,
            open_timeout: Duration::from_secs(60),
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            exp_base: 2.0,
            jitter_enabled: true,
            retry_status_set: vec![408, 429, 500, 502, 503, 504],
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            pool_timeout: Duration::from_secs(5),
            max_in_flight: None,
        }
    }
}

impl ResilienceConfig {
    /// True when `status` should be treated as an attempt failure.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_status_set.contains(&status)
    }
}

/// One downstream service as the proxy sees it.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    /// Stable key: breaker name, metric label, route target.
    pub service_name: String,
    /// Scheme + authority the routed path is appended to.
    pub base_url: String,
    /// Shared secret injected as `X-Service-Auth`. Optional so a missing
    /// secret degrades to downstream rejection instead of refusing to boot.
    pub service_auth_secret: Option<String>,
    pub config: ResilienceConfig,
}

impl ProxyTarget {
    pub fn new(service_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            base_url: base_url.into(),
            service_auth_secret: None,
            config: ResilienceConfig::default(),
        }
    }

    pub fn with_auth_secret(mut self, secret: Option<String>) -> Self {
        self.service_auth_secret = secret;
        self
    }

    pub fn with_config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }
}
