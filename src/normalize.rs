use chrono::{DateTime, TimeZone, Utc};

use crate::models::{Assessment, AssessmentStatus, Endpoint, RawAssessment};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("assessment payload is missing a host")]
    MissingHost,
    #[error("assessment payload for {host} has missing or unknown status {status:?}")]
    UnknownStatus { host: String, status: Option<String> },
    #[error("READY assessment for {host} has no endpoints")]
    NoEndpoints { host: String },
}

/// Validates and flattens a raw upstream payload into the internal model.
///
/// Endpoint order is preserved exactly as received; the renderer presents
/// rows in server-reported order. A structurally incompatible payload fails
/// here rather than silently becoming an empty report.
pub fn normalize(raw: RawAssessment) -> Result<Assessment, ValidationError> {
    let RawAssessment {
        host,
        port,
        protocol,
        is_public,
        status,
        status_message: _,
        start_time,
        test_time,
        engine_version,
        criteria_version,
        endpoints,
    } = raw;

    let host = host
        .filter(|h| !h.trim().is_empty())
        .ok_or(ValidationError::MissingHost)?;
    let parsed_status = status
        .as_deref()
        .and_then(AssessmentStatus::from_upstream)
        .ok_or_else(|| ValidationError::UnknownStatus {
            host: host.clone(),
            status: status.clone(),
        })?;
    if parsed_status == AssessmentStatus::Ready && endpoints.is_empty() {
        return Err(ValidationError::NoEndpoints { host });
    }

    Ok(Assessment {
        host,
        port: port.unwrap_or(443),
        protocol: protocol.unwrap_or_default(),
        is_public: is_public.unwrap_or(false),
        status: parsed_status,
        start_time: start_time.and_then(from_epoch_millis),
        test_time: test_time.and_then(from_epoch_millis),
        engine_version: engine_version.unwrap_or_default(),
        criteria_version: criteria_version.unwrap_or_default(),
        endpoints: endpoints.into_iter().map(Endpoint::from).collect(),
    })
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawEndpoint;
    use assert_matches::assert_matches;

    fn endpoint(ip: &str) -> RawEndpoint {
        RawEndpoint {
            ip_address: Some(ip.into()),
            status_message: Some("Ready".into()),
            grade: Some("A".into()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_host_is_rejected() {
        let raw = RawAssessment {
            status: Some("READY".into()),
            endpoints: vec![endpoint("1.2.3.4")],
            ..Default::default()
        };
        assert_matches!(normalize(raw), Err(ValidationError::MissingHost));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let raw = RawAssessment {
            host: Some("example.com".into()),
            status: Some("STARTING".into()),
            ..Default::default()
        };
        assert_matches!(
            normalize(raw),
            Err(ValidationError::UnknownStatus { status: Some(s), .. }) if s == "STARTING"
        );
    }

    #[test]
    fn ready_with_empty_endpoint_list_is_rejected() {
        let raw = RawAssessment {
            host: Some("example.com".into()),
            status: Some("READY".into()),
            ..Default::default()
        };
        assert_matches!(normalize(raw), Err(ValidationError::NoEndpoints { host }) if host == "example.com");
    }

    #[test]
    fn endpoint_order_is_preserved() {
        let raw = RawAssessment {
            host: Some("example.com".into()),
            status: Some("READY".into()),
            endpoints: vec![endpoint("1.1.1.1"), endpoint("2.2.2.2"), endpoint("3.3.3.3")],
            ..Default::default()
        };
        let assessment = normalize(raw).unwrap();
        let ips: Vec<_> = assessment
            .endpoints
            .iter()
            .map(|e| e.ip_address.as_str())
            .collect();
        assert_eq!(ips, ["1.1.1.1", "2.2.2.2", "3.3.3.3"]);
    }

    #[test]
    fn optional_fields_are_coerced_to_defaults() {
        let raw = RawAssessment {
            host: Some("example.com".into()),
            status: Some("READY".into()),
            start_time: Some(1_700_000_000_000),
            endpoints: vec![RawEndpoint {
                ip_address: Some("1.2.3.4".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let assessment = normalize(raw).unwrap();
        assert_eq!(assessment.port, 443);
        assert_eq!(assessment.protocol, "");
        assert!(!assessment.is_public);
        assert!(assessment.start_time.is_some());
        assert!(assessment.test_time.is_none());
        let ep = &assessment.endpoints[0];
        assert_eq!(ep.grade, "");
        assert!(!ep.has_warnings);
        assert!(!ep.is_exceptional);
    }

    #[test]
    fn transient_status_with_no_endpoints_is_acceptable() {
        let raw = RawAssessment {
            host: Some("example.com".into()),
            status: Some("IN_PROGRESS".into()),
            ..Default::default()
        };
        let assessment = normalize(raw).unwrap();
        assert_eq!(assessment.status, AssessmentStatus::InProgress);
        assert!(!assessment.status.is_terminal());
        assert!(assessment.endpoints.is_empty());
    }
}
