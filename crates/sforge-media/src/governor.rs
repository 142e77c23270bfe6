//! Per-domain admission control with adaptive backoff.
//!
//! The governor protects the pipeline from triggering stricter upstream
//! blocking: a sliding window caps request rate per domain, an exponential
//! backoff floor spaces requests out after failures, and a bot-detection
//! classification arms a global cooldown during which every admission is
//! denied. One consecutive-failure counter is kept globally rather than
//! per strategy: upstream blocking is domain-wide, not strategy-specific,
//! and a success fully resets the state so a domain is not penalized after
//! a transient block lifts.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use sforge_models::{classify, ErrorKind};

/// Governor tuning knobs.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Maximum admitted requests per domain within the window.
    pub max_requests: usize,
    /// Sliding window length.
    pub window: Duration,
    /// Base spacing between requests after failures (doubles per failure).
    pub base_backoff: Duration,
    /// Base cooldown armed by a bot-detection failure (doubles per failure).
    pub bot_backoff_base: Duration,
    /// Upper bound on any computed backoff or cooldown.
    pub max_cooldown: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            base_backoff: Duration::from_secs(1),
            bot_backoff_base: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(3600),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

#[derive(Debug, Default)]
struct DomainWindow {
    timestamps: VecDeque<Instant>,
}

#[derive(Debug, Default)]
struct GovernorState {
    domains: HashMap<String, DomainWindow>,
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
}

/// Process-scoped rate governor. Constructed once by whoever composes the
/// pipeline and injected wherever admission decisions are made.
pub struct RateGovernor {
    config: GovernorConfig,
    state: Mutex<GovernorState>,
}

impl RateGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(GovernorState::default()),
        }
    }

    /// Check whether a request to `domain` may go out now.
    ///
    /// Window entries older than the configured window are pruned before
    /// every check. On `Allowed` the current timestamp is recorded.
    pub fn admit(&self, domain: &str) -> Admission {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();

        if let Some(until) = state.cooldown_until {
            if until > now {
                return Admission::Denied {
                    retry_after: until - now,
                };
            }
            state.cooldown_until = None;
        }

        let failures = state.consecutive_failures;
        let window = state.domains.entry(domain.to_string()).or_default();

        // Prune entries that fell out of the window
        while let Some(&front) = window.timestamps.front() {
            if now.duration_since(front) > self.config.window {
                window.timestamps.pop_front();
            } else {
                break;
            }
        }

        if window.timestamps.len() >= self.config.max_requests {
            let oldest = *window.timestamps.front().unwrap();
            let retry_after = (oldest + self.config.window).saturating_duration_since(now);
            debug!(domain = domain, "Admission denied: window full");
            return Admission::Denied { retry_after };
        }

        // Exponential spacing floor after failures
        if failures > 0 {
            if let Some(&last) = window.timestamps.back() {
                let floor = self
                    .config
                    .base_backoff
                    .saturating_mul(2u32.saturating_pow(failures.min(10)))
                    .min(self.config.max_cooldown);
                let elapsed = now.duration_since(last);
                if elapsed < floor {
                    debug!(
                        domain = domain,
                        failures = failures,
                        "Admission denied: backoff floor"
                    );
                    return Admission::Denied {
                        retry_after: floor - elapsed,
                    };
                }
            }
        }

        window.timestamps.push_back(now);
        Admission::Allowed
    }

    /// Record a failed request, classifying the error text.
    ///
    /// A failure classified as bot detection arms the global cooldown:
    /// `min(max_cooldown, bot_backoff_base * 2^min(failures, 5))`.
    /// Returns the classification so callers can act on it.
    pub fn report_failure(&self, message: &str) -> ErrorKind {
        let kind = classify(message);
        let mut state = self.state.lock().unwrap();
        state.consecutive_failures += 1;

        if kind.escalates_backoff() {
            let exp = state.consecutive_failures.min(5);
            let cooldown = self
                .config
                .bot_backoff_base
                .saturating_mul(2u32.saturating_pow(exp))
                .min(self.config.max_cooldown);
            state.cooldown_until = Some(Instant::now() + cooldown);
            warn!(
                failures = state.consecutive_failures,
                cooldown_secs = cooldown.as_secs(),
                "Bot detection reported, arming global cooldown"
            );
        }

        kind
    }

    /// Record a successful request: resets the failure counter and clears
    /// any active cooldown.
    pub fn report_success(&self) {
        let mut state = self.state.lock().unwrap();
        state.consecutive_failures = 0;
        state.cooldown_until = None;
    }

    /// Current consecutive-failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().unwrap().consecutive_failures
    }

    /// Remaining cooldown, if one is active.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let state = self.state.lock().unwrap();
        state
            .cooldown_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .filter(|d| !d.is_zero())
    }
}
