use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse assessment lifecycle reported by the remote service.
///
/// `Ready` and `Error` are terminal; `Dns` and `InProgress` mean the scan is
/// still running upstream and the client must keep polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentStatus {
    #[serde(rename = "DNS")]
    Dns,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "ERROR")]
    Error,
}

impl AssessmentStatus {
    pub fn from_upstream(value: &str) -> Option<Self> {
        match value {
            "DNS" => Some(Self::Dns),
            "IN_PROGRESS" => Some(Self::InProgress),
            "READY" => Some(Self::Ready),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

/// Loosely-typed mirror of the upstream `/analyze` JSON document.
///
/// Every field is optional at this layer; the normalizer decides what is
/// actually required before anything downstream sees the data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAssessment {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
    pub is_public: Option<bool>,
    pub status: Option<String>,
    pub status_message: Option<String>,
    pub start_time: Option<i64>,
    pub test_time: Option<i64>,
    pub engine_version: Option<String>,
    pub criteria_version: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<RawEndpoint>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEndpoint {
    pub ip_address: Option<String>,
    pub server_name: Option<String>,
    pub status_message: Option<String>,
    pub grade: Option<String>,
    pub grade_trust_ignored: Option<String>,
    pub has_warnings: Option<bool>,
    pub is_exceptional: Option<bool>,
}

/// One resolved network address serving the assessed host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub ip_address: String,
    pub server_name: String,
    pub status_message: String,
    pub grade: String,
    pub grade_trust_ignored: String,
    pub has_warnings: bool,
    pub is_exceptional: bool,
}

impl From<RawEndpoint> for Endpoint {
    fn from(raw: RawEndpoint) -> Self {
        Self {
            ip_address: raw.ip_address.unwrap_or_default(),
            server_name: raw.server_name.unwrap_or_default(),
            status_message: raw.status_message.unwrap_or_default(),
            grade: raw.grade.unwrap_or_default(),
            grade_trust_ignored: raw.grade_trust_ignored.unwrap_or_default(),
            has_warnings: raw.has_warnings.unwrap_or(false),
            is_exceptional: raw.is_exceptional.unwrap_or(false),
        }
    }
}

/// Fully validated assessment, immutable once its status is terminal.
///
/// Endpoint order is exactly the order the service reported; the report
/// renderer depends on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub is_public: bool,
    pub status: AssessmentStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub test_time: Option<DateTime<Utc>>,
    pub engine_version: String,
    pub criteria_version: String,
    pub endpoints: Vec<Endpoint>,
}

/// Payload of the `/info` capability probe.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    #[serde(default)]
    pub engine_version: String,
    #[serde(default)]
    pub criteria_version: String,
    #[serde(default)]
    pub client_max_assessments: i64,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// A rendered report, produced once per terminal READY assessment.
#[derive(Debug, Clone)]
pub struct Report {
    pub host: String,
    pub generated_at: DateTime<Utc>,
    pub identifier: String,
    pub bytes: Vec<u8>,
}
