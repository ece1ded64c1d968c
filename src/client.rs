use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::{Assessment, AssessmentStatus, RawAssessment, ServiceInfo};
use crate::normalize::{normalize, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected upstream response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    #[error("invalid host {host:?}: {reason}")]
    InvalidInput { host: String, reason: &'static str },
    #[error("assessment service is unreachable")]
    ServiceUnavailable(#[source] ClientError),
    #[error("failed to submit assessment for {host}")]
    SubmissionFailed {
        host: String,
        #[source]
        source: ClientError,
    },
    #[error("assessment of {host} failed upstream: {message}")]
    AssessmentFailed { host: String, message: String },
    #[error("assessment of {host} did not finish within {}s", waited.as_secs())]
    Timeout { host: String, waited: Duration },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Knobs for one `assess` call.
#[derive(Debug, Clone)]
pub struct AssessOptions {
    /// Total wall-clock budget for the poll loop.
    pub max_poll: Duration,
    /// Delay before the second request; doubles per transient poll.
    pub initial_interval: Duration,
    /// Backoff ceiling.
    pub max_interval: Duration,
    /// Force a fresh scan instead of the service's cached result.
    pub start_new: bool,
}

impl Default for AssessOptions {
    fn default() -> Self {
        Self {
            max_poll: Duration::from_secs(300),
            initial_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(60),
            start_new: false,
        }
    }
}

/// The two upstream operations the poll loop needs. `SslLabsClient` is the
/// real implementation; tests drive the state machine with a scripted fake.
#[async_trait]
pub trait AnalyzeApi: Send + Sync {
    async fn service_info(&self) -> Result<ServiceInfo, ClientError>;
    async fn analyze(&self, host: &str, start_new: bool) -> Result<RawAssessment, ClientError>;
}

/// HTTP client for the SSL Labs-style assessment API.
///
/// Constructed once at startup and shared by reference across request
/// handlers; holds the single `reqwest::Client`.
pub struct SslLabsClient {
    http: reqwest::Client,
    analyze_url: String,
    info_url: String,
}

impl SslLabsClient {
    pub fn new(api_base_url: &str, info_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("sslpulse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            analyze_url: format!("{}/analyze", api_base_url.trim_end_matches('/')),
            info_url: info_url.to_string(),
        })
    }

    /// Drives the polling state machine to a terminal state for `host`.
    pub async fn assess(&self, host: &str, opts: &AssessOptions) -> Result<Assessment, AssessError> {
        assess_with(self, host, opts).await
    }
}

#[async_trait]
impl AnalyzeApi for SslLabsClient {
    async fn service_info(&self) -> Result<ServiceInfo, ClientError> {
        let response = self.http.get(&self.info_url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn analyze(&self, host: &str, start_new: bool) -> Result<RawAssessment, ClientError> {
        let mut request = self.http.get(&self.analyze_url).query(&[("host", host)]);
        if start_new {
            request = request.query(&[("startNew", "on")]);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

/// The assessment poll loop.
///
/// Transient states sleep and re-poll with doubling backoff; `ERROR` stops
/// immediately; `READY` is only accepted once the endpoint list is non-empty
/// and every endpoint has resolved. The loop never returns `Timeout` before
/// `opts.max_poll` of wall-clock time has elapsed, and issues no further
/// requests after returning. Dropping the future cancels the pending sleep or
/// request, so callers can abort an in-flight assessment at any time.
pub async fn assess_with<A: AnalyzeApi + ?Sized>(
    api: &A,
    host: &str,
    opts: &AssessOptions,
) -> Result<Assessment, AssessError> {
    let host = host.trim();
    if let Err(reason) = validate_host(host) {
        return Err(AssessError::InvalidInput {
            host: host.to_string(),
            reason,
        });
    }

    // Pre-flight probe: fail fast instead of polling a known-down service.
    let service = api
        .service_info()
        .await
        .map_err(AssessError::ServiceUnavailable)?;
    debug!(
        host,
        engine = %service.engine_version,
        criteria = %service.criteria_version,
        "assessment service reachable"
    );

    let started = Instant::now();
    let mut interval = opts.initial_interval;
    let mut first = true;

    loop {
        let start_new = first && opts.start_new;
        match api.analyze(host, start_new).await {
            Ok(raw) => match raw.status.as_deref().and_then(AssessmentStatus::from_upstream) {
                Some(AssessmentStatus::Error) => {
                    let message = raw
                        .status_message
                        .unwrap_or_else(|| "assessment failed".to_string());
                    return Err(AssessError::AssessmentFailed {
                        host: host.to_string(),
                        message,
                    });
                }
                Some(AssessmentStatus::Ready) if endpoints_resolved(&raw) => {
                    info!(host, endpoints = raw.endpoints.len(), "assessment ready");
                    return Ok(normalize(raw)?);
                }
                Some(AssessmentStatus::Ready) => {
                    warn!(host, "READY with unresolved endpoint list, continuing to poll");
                }
                Some(status) => {
                    debug!(host, status = ?status, "assessment still running");
                }
                None => {
                    warn!(host, status = ?raw.status, "missing or unknown status, continuing to poll");
                }
            },
            Err(source) if first => {
                return Err(AssessError::SubmissionFailed {
                    host: host.to_string(),
                    source,
                });
            }
            // A failed poll is not an upstream verdict; retry until the
            // deadline like any transient state.
            Err(error) => warn!(host, %error, "poll failed, will retry"),
        }
        first = false;

        let waited = started.elapsed();
        if waited >= opts.max_poll {
            return Err(AssessError::Timeout {
                host: host.to_string(),
                waited,
            });
        }
        tokio::time::sleep(interval).await;
        interval = (interval * 2).min(opts.max_interval);
    }
}

/// A READY payload counts as complete only when it has at least one endpoint
/// and every endpoint's own status message (when present) reads "Ready".
fn endpoints_resolved(raw: &RawAssessment) -> bool {
    !raw.endpoints.is_empty()
        && raw.endpoints.iter().all(|endpoint| {
            endpoint
                .status_message
                .as_deref()
                .map_or(true, |message| message == "Ready")
        })
}

fn validate_host(host: &str) -> Result<(), &'static str> {
    if host.is_empty() {
        return Err("host must not be empty");
    }
    if host.parse::<std::net::IpAddr>().is_ok() {
        return Ok(());
    }
    if host.len() > 253 {
        return Err("host name too long");
    }
    for label in host.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err("empty or oversized DNS label");
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err("invalid character in host name");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err("DNS label must not start or end with '-'");
        }
    }
    Ok(())
}
