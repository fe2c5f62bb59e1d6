//! Protected HTTP client: identity rotation, randomized pacing, hourly
//! budget, stop-signal handling, and a consecutive-failure circuit breaker.
//!
//! All waiting is awaited `tokio::time::sleep`, so paused-time tests can
//! drive the state machine without real delays.

use crate::config::{DelaysConfig, ErrorsConfig, LimitsConfig};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause applied after a 429 with no usable Retry-After header.
const RATE_LIMIT_FALLBACK_PAUSE: Duration = Duration::from_secs(300);
/// Pause applied after a 403 (likely bot detection).
const FORBIDDEN_PAUSE: Duration = Duration::from_secs(1800);
/// Pause applied after a 503.
const UNAVAILABLE_PAUSE: Duration = Duration::from_secs(300);

/// Cushion added when sleeping out the remainder of an hourly window.
const HOUR_ROLLOVER_CUSHION: Duration = Duration::from_secs(60);

/// Which politeness window to apply before a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayClass {
    /// Ordinary spacing between consecutive requests.
    Request,
    /// Second page (stats after roster) on the same site.
    SameTargetPage,
    /// First request against a new site.
    TargetSwitch,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("resource not found ({0})")]
    NotFound(u16),
    #[error("server sent stop signal {0}")]
    StopSignal(u16),
    #[error("connection failed")]
    ConnectionFailed,
    #[error("tls handshake failed")]
    TlsFailed,
    #[error("request timed out")]
    TimedOut,
}

impl FetchError {
    /// Failures where retrying sibling URLs on the same host is pointless.
    pub fn is_host_level(&self) -> bool {
        matches!(
            self,
            FetchError::ConnectionFailed
                | FetchError::TlsFailed
                | FetchError::TimedOut
                | FetchError::StopSignal(_)
        )
    }
}

/// A successfully fetched page, with the post-redirect URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub final_url: String,
    pub status: u16,
}

pub type FetchResult = Result<FetchedPage, FetchError>;

/// Consecutive-failure circuit breaker. Stop signals and timeouts count;
/// connection and TLS failures do not (a dead host says nothing about us
/// being throttled).
#[derive(Debug)]
pub struct CircuitBreaker {
    failures: u32,
    limit: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(limit: u32, cooldown_secs: f64) -> Self {
        CircuitBreaker {
            failures: 0,
            limit,
            cooldown: Duration::from_secs_f64(cooldown_secs),
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Returns true when this failure trips the breaker.
    pub fn record_failure(&mut self) -> bool {
        self.failures += 1;
        self.failures >= self.limit
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Sleep out the cooldown and reset the counter.
    pub async fn cool_down(&mut self) {
        warn!(
            failures = self.failures,
            cooldown_secs = self.cooldown.as_secs(),
            "circuit breaker tripped, cooling down"
        );
        tokio::time::sleep(self.cooldown).await;
        self.failures = 0;
    }
}

/// How long to pause after a given stop signal before resuming.
pub fn stop_signal_pause(status: u16, retry_after_secs: Option<u64>) -> Duration {
    match status {
        429 => retry_after_secs
            .map(Duration::from_secs)
            .unwrap_or(RATE_LIMIT_FALLBACK_PAUSE),
        403 => FORBIDDEN_PAUSE,
        _ => UNAVAILABLE_PAUSE,
    }
}

pub struct ProtectedClient {
    http: reqwest::Client,
    delays: DelaysConfig,
    errors: ErrorsConfig,
    breaker: CircuitBreaker,
    agent: &'static str,
    agent_requests: u32,
    agent_budget: u32,
    hour_start: Instant,
    hour_requests: u32,
    hourly_cap: u32,
    total_requests: u64,
    last_request: Option<Instant>,
    last_failure: Option<FetchError>,
}

impl ProtectedClient {
    pub fn new(
        delays: DelaysConfig,
        limits: LimitsConfig,
        errors: ErrorsConfig,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        let breaker = CircuitBreaker::new(
            errors.consecutive_failures_limit,
            errors.circuit_breaker_cooldown,
        );
        let mut rng = rand::thread_rng();
        Ok(ProtectedClient {
            http,
            delays,
            breaker,
            agent: USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())],
            agent_requests: 0,
            agent_budget: rng.gen_range(15..=25),
            hour_start: Instant::now(),
            hour_requests: 0,
            hourly_cap: limits.max_requests_per_hour,
            total_requests: 0,
            errors,
            last_request: None,
            last_failure: None,
        })
    }

    /// Total requests issued over the client's lifetime.
    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Requests issued in the current hourly window.
    pub fn hour_requests(&self) -> u32 {
        self.hour_requests
    }

    /// The most recent failure, for candidate-list short-circuiting.
    pub fn last_failure(&self) -> Option<&FetchError> {
        self.last_failure.as_ref()
    }

    /// Fetch a URL with full protection: pacing, budget, identity rotation,
    /// timeout retries, and breaker accounting.
    pub async fn get(
        &mut self,
        url: &str,
        class: DelayClass,
        referer: Option<&str>,
    ) -> FetchResult {
        self.pace(class).await;
        self.enforce_hourly_budget().await;
        self.maybe_rotate_agent();

        let mut attempt: u32 = 1;
        loop {
            self.total_requests += 1;
            self.hour_requests += 1;

            let result = self
                .http
                .get(url)
                .headers(self.browser_headers(referer))
                .send()
                .await;
            self.last_request = Some(Instant::now());

            match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success() {
                        let final_url = response.url().to_string();
                        let body = response.text().await.map_err(|e| {
                            self.note_failure(classify_transport_error(&e), true)
                        })?;
                        self.breaker.record_success();
                        self.last_failure = None;
                        debug!(url, status, "fetched");
                        return Ok(FetchedPage {
                            body,
                            final_url,
                            status,
                        });
                    }
                    if self.errors.stop_signals.contains(&status) {
                        let retry_after = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok());
                        let pause = stop_signal_pause(status, retry_after);
                        warn!(url, status, pause_secs = pause.as_secs(), "stop signal");
                        tokio::time::sleep(pause).await;
                        let err = self.note_failure(FetchError::StopSignal(status), true);
                        self.maybe_cool_down().await;
                        return Err(err);
                    }
                    debug!(url, status, "non-success status");
                    return Err(self.note_failure(FetchError::NotFound(status), false));
                }
                Err(e) => {
                    let kind = classify_transport_error(&e);
                    match kind {
                        FetchError::TimedOut if attempt < self.errors.max_retries => {
                            let backoff = (self.errors.retry_delay_base * attempt as f64)
                                .min(self.errors.retry_delay_max);
                            info!(url, attempt, backoff_secs = backoff, "timeout, retrying");
                            tokio::time::sleep(Duration::from_secs_f64(backoff)).await;
                            attempt += 1;
                            continue;
                        }
                        FetchError::TimedOut => {
                            let err = self.note_failure(kind, true);
                            self.maybe_cool_down().await;
                            return Err(err);
                        }
                        // Dead or misconfigured host: give up immediately and
                        // leave the breaker alone.
                        _ => {
                            debug!(url, error = %e, "transport failure");
                            return Err(self.note_failure(kind, false));
                        }
                    }
                }
            }
        }
    }

    fn note_failure(&mut self, kind: FetchError, counts_toward_breaker: bool) -> FetchError {
        if counts_toward_breaker {
            self.breaker.record_failure();
        }
        self.last_failure = Some(kind.clone());
        kind
    }

    async fn maybe_cool_down(&mut self) {
        if self.breaker.failures() >= self.errors.consecutive_failures_limit {
            self.breaker.cool_down().await;
        }
    }

    /// Sleep out whatever remains of the politeness window since the last
    /// request. The first request goes out immediately.
    async fn pace(&self, class: DelayClass) {
        let Some(last) = self.last_request else {
            return;
        };
        let window = match class {
            DelayClass::Request => self.delays.between_requests,
            DelayClass::SameTargetPage => self.delays.between_pages_same_target,
            DelayClass::TargetSwitch => self.delays.between_targets,
        };
        let secs = rand::thread_rng().gen_range(window[0]..=window[1]);
        let target = Duration::from_secs_f64(secs);
        let elapsed = last.elapsed();
        if elapsed < target {
            tokio::time::sleep(target - elapsed).await;
        }
    }

    async fn enforce_hourly_budget(&mut self) {
        let elapsed = self.hour_start.elapsed();
        if elapsed >= Duration::from_secs(3600) {
            self.hour_start = Instant::now();
            self.hour_requests = 0;
            return;
        }
        if self.hour_requests >= self.hourly_cap {
            let wait = Duration::from_secs(3600) - elapsed + HOUR_ROLLOVER_CUSHION;
            info!(
                wait_secs = wait.as_secs(),
                "hourly request budget exhausted, sleeping to rollover"
            );
            tokio::time::sleep(wait).await;
            self.hour_start = Instant::now();
            self.hour_requests = 0;
        }
    }

    fn maybe_rotate_agent(&mut self) {
        self.agent_requests += 1;
        if self.agent_requests >= self.agent_budget {
            let mut rng = rand::thread_rng();
            self.agent = USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())];
            self.agent_budget = rng.gen_range(15..=25);
            self.agent_requests = 0;
            debug!("rotated user agent");
        }
    }

    fn browser_headers(&self, referer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(self.agent));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(
            "Upgrade-Insecure-Requests",
            HeaderValue::from_static("1"),
        );
        headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
        headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
        headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
        if let Some(r) = referer {
            if let Ok(value) = HeaderValue::from_str(r) {
                headers.insert(REFERER, value);
                headers.insert("Sec-Fetch-Site", HeaderValue::from_static("same-origin"));
            }
        }
        headers
    }
}

fn classify_transport_error(e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        return FetchError::TimedOut;
    }
    let detail = format!("{e:?}").to_lowercase();
    if detail.contains("certificate") || detail.contains("tls") || detail.contains("ssl") {
        return FetchError::TlsFailed;
    }
    FetchError::ConnectionFailed
}
