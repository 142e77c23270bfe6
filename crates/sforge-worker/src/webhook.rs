//! Webhook callback delivery.
//!
//! Exactly one callback is posted per job. Attempts follow a progressive
//! delay schedule; the response status decides whether the next attempt
//! happens at all: 2xx stops on success, 404 and DNS failures stop
//! immediately (the URL is wrong, retries won't help), 429 retries after
//! an extended delay, request timeouts and 5xx retry, every other 4xx is
//! terminal. The outcome is only observable through logs: the HTTP
//! response to the original request went out at acceptance time.

use std::time::Duration;
use tracing::{info, warn};

use sforge_models::CallbackPayload;

use crate::error::{WorkerError, WorkerResult};

/// Webhook delivery configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Delay before each retry; its length bounds the retry count.
    pub schedule: Vec<Duration>,
    /// Delay used instead of the scheduled one after a 429.
    pub extended_delay: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            schedule: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(30),
            ],
            extended_delay: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// What a delivery run did.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    /// Total attempts made.
    pub attempts: u32,
    /// Whether a 2xx was received.
    pub delivered: bool,
    /// Status code of the last response, if any arrived.
    pub last_status: Option<u16>,
    /// Why delivery stopped without success.
    pub terminal_reason: Option<String>,
}

/// Per-attempt decision.
enum AttemptOutcome {
    Delivered,
    Retry { extended: bool, detail: String },
    Terminal { detail: String },
}

/// Webhook delivery client.
#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookClient {
    pub fn new(config: WebhookConfig) -> WorkerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("http client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Deliver `payload` to `callback_url`, honoring the retry schedule.
    pub async fn deliver(
        &self,
        callback_url: &str,
        payload: &CallbackPayload,
    ) -> DeliveryReport {
        let max_attempts = self.config.schedule.len() as u32 + 1;
        let mut attempts = 0u32;
        let mut last_status = None;

        loop {
            attempts += 1;
            let outcome = self.attempt(callback_url, payload, &mut last_status).await;

            match outcome {
                AttemptOutcome::Delivered => {
                    info!(
                        url = callback_url,
                        attempts = attempts,
                        "Webhook delivered"
                    );
                    return DeliveryReport {
                        attempts,
                        delivered: true,
                        last_status,
                        terminal_reason: None,
                    };
                }
                AttemptOutcome::Terminal { detail } => {
                    warn!(
                        url = callback_url,
                        attempts = attempts,
                        "Webhook delivery stopped: {}",
                        detail
                    );
                    return DeliveryReport {
                        attempts,
                        delivered: false,
                        last_status,
                        terminal_reason: Some(detail),
                    };
                }
                AttemptOutcome::Retry { extended, detail } => {
                    if attempts >= max_attempts {
                        warn!(
                            url = callback_url,
                            attempts = attempts,
                            "Webhook retries exhausted: {}",
                            detail
                        );
                        return DeliveryReport {
                            attempts,
                            delivered: false,
                            last_status,
                            terminal_reason: Some(format!("retries exhausted: {}", detail)),
                        };
                    }
                    let scheduled = self.config.schedule[(attempts - 1) as usize];
                    let delay = if extended {
                        scheduled.max(self.config.extended_delay)
                    } else {
                        scheduled
                    };
                    info!(
                        url = callback_url,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Webhook attempt failed, retrying: {}",
                        detail
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        callback_url: &str,
        payload: &CallbackPayload,
        last_status: &mut Option<u16>,
    ) -> AttemptOutcome {
        let response = self.http.post(callback_url).json(payload).send().await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                *last_status = Some(status.as_u16());

                if status.is_success() {
                    return AttemptOutcome::Delivered;
                }
                match status.as_u16() {
                    404 => AttemptOutcome::Terminal {
                        detail: "callback URL not found (404)".to_string(),
                    },
                    429 => AttemptOutcome::Retry {
                        extended: true,
                        detail: "rate limited by receiver (429)".to_string(),
                    },
                    408 => AttemptOutcome::Retry {
                        extended: false,
                        detail: "receiver request timeout (408)".to_string(),
                    },
                    code if status.is_client_error() => AttemptOutcome::Terminal {
                        detail: format!("client error {}", code),
                    },
                    code => AttemptOutcome::Retry {
                        extended: false,
                        detail: format!("server error {}", code),
                    },
                }
            }
            Err(e) => {
                let text = e.to_string().to_lowercase();
                // A name that does not resolve will never start resolving
                if text.contains("dns") || text.contains("failed to lookup") {
                    AttemptOutcome::Terminal {
                        detail: format!("dns resolution failed: {}", e),
                    }
                } else {
                    AttemptOutcome::Retry {
                        extended: false,
                        detail: format!("request error: {}", e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sforge_models::{JobRecord, JobRequest};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

    fn fast_config() -> WebhookConfig {
        WebhookConfig {
            schedule: vec![
                Duration::from_millis(1),
                Duration::from_millis(1),
                Duration::from_millis(1),
                Duration::from_millis(1),
                Duration::from_millis(1),
            ],
            extended_delay: Duration::from_millis(2),
            request_timeout: Duration::from_secs(2),
        }
    }

    fn payload() -> CallbackPayload {
        let request = JobRequest::new("https://youtu.be/dQw4w9WgXcQ", "https://caller/hook");
        let mut record = JobRecord::new(&request);
        record.complete();
        CallbackPayload::for_record(&record)
    }

    /// Responds 500 for the first N requests, then 200.
    struct FlakyResponder {
        failures: std::sync::atomic::AtomicU32,
        fail_count: u32,
    }

    impl Respond for FlakyResponder {
        fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
            let n = self
                .failures
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n < self.fail_count {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200)
            }
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebhookClient::new(fast_config()).unwrap();
        let report = client
            .deliver(&format!("{}/hook", server.uri()), &payload())
            .await;

        assert!(report.delivered);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.last_status, Some(200));
    }

    #[tokio::test]
    async fn test_404_gets_exactly_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebhookClient::new(fast_config()).unwrap();
        let report = client
            .deliver(&format!("{}/hook", server.uri()), &payload())
            .await;

        assert!(!report.delivered);
        assert_eq!(report.attempts, 1);
        assert!(report.terminal_reason.unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_500_three_times_then_200_makes_four_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(FlakyResponder {
                failures: std::sync::atomic::AtomicU32::new(0),
                fail_count: 3,
            })
            .expect(4)
            .mount(&server)
            .await;

        let client = WebhookClient::new(fast_config()).unwrap();
        let report = client
            .deliver(&format!("{}/hook", server.uri()), &payload())
            .await;

        assert!(report.delivered);
        assert_eq!(report.attempts, 4);
        assert_eq!(report.last_status, Some(200));
    }

    #[tokio::test]
    async fn test_persistent_500_exhausts_schedule() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500))
            .expect(6) // initial + 5 scheduled retries
            .mount(&server)
            .await;

        let client = WebhookClient::new(fast_config()).unwrap();
        let report = client
            .deliver(&format!("{}/hook", server.uri()), &payload())
            .await;

        assert!(!report.delivered);
        assert_eq!(report.attempts, 6);
    }

    #[tokio::test]
    async fn test_403_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebhookClient::new(fast_config()).unwrap();
        let report = client
            .deliver(&format!("{}/hook", server.uri()), &payload())
            .await;

        assert!(!report.delivered);
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test]
    async fn test_payload_body_reaches_receiver() {
        use wiremock::matchers::body_partial_json;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "status": "completed"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebhookClient::new(fast_config()).unwrap();
        let report = client
            .deliver(&format!("{}/hook", server.uri()), &payload())
            .await;

        assert!(report.delivered);
    }
}
