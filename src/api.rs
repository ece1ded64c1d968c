use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::client::{AnalyzeApi, AssessError};
use crate::config::AppConfig;
use crate::service::{generate_report, ReportError};

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn AnalyzeApi>,
    pub config: AppConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeForm {
    host: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn analyze(State(state): State<AppState>, Form(form): Form<AnalyzeForm>) -> Response {
    let opts = state.config.assess_options();
    match generate_report(state.client.as_ref(), &form.host, &opts).await {
        Ok(report) => {
            let path = Path::new(&state.config.files_dir).join(&report.identifier);
            if let Err(e) = tokio::fs::write(&path, &report.bytes).await {
                error!(host = %report.host, error = %e, "failed to store report");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(AnalyzeResponse {
                        completed: false,
                        name: None,
                        result: None,
                        error: Some("failed to store generated report".into()),
                    }),
                )
                    .into_response();
            }
            info!(host = %report.host, name = %report.identifier, "report stored");
            Json(AnalyzeResponse {
                completed: true,
                name: Some(report.identifier.clone()),
                result: Some(format!("/files/{}", report.identifier)),
                error: None,
            })
            .into_response()
        }
        Err(e) => {
            warn!(host = %form.host, error = %e, "report generation failed");
            (
                status_for(&e),
                Json(AnalyzeResponse {
                    completed: false,
                    name: None,
                    result: None,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Maps the error taxonomy onto user-distinguishable status codes: invalid
/// input, upstream unavailable, upstream-reported failure, and timeout each
/// get their own code.
fn status_for(err: &ReportError) -> StatusCode {
    match err {
        ReportError::Assess(AssessError::InvalidInput { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        ReportError::Assess(AssessError::ServiceUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        ReportError::Assess(AssessError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        ReportError::Assess(
            AssessError::SubmissionFailed { .. } | AssessError::AssessmentFailed { .. },
        ) => StatusCode::BAD_GATEWAY,
        ReportError::Assess(AssessError::Validation(_)) | ReportError::Render(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let files = ServeDir::new(&state.config.files_dir);
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .nest_service("/files", files)
        .with_state(state)
}

pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server_port));
    info!("Report service: http://localhost:{}", addr.port());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = create_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::models::{RawAssessment, RawEndpoint, ServiceInfo};
    use crate::report::RenderError;
    use async_trait::async_trait;

    struct ReadyApi;

    #[async_trait]
    impl AnalyzeApi for ReadyApi {
        async fn service_info(&self) -> Result<ServiceInfo, ClientError> {
            Ok(ServiceInfo::default())
        }

        async fn analyze(&self, _host: &str, _start_new: bool) -> Result<RawAssessment, ClientError> {
            Ok(RawAssessment {
                host: Some("example.com".into()),
                status: Some("READY".into()),
                endpoints: vec![RawEndpoint {
                    ip_address: Some("93.184.216.34".into()),
                    status_message: Some("Ready".into()),
                    grade: Some("A".into()),
                    ..Default::default()
                }],
                ..Default::default()
            })
        }
    }

    fn state_with_files_dir(files_dir: &std::path::Path) -> AppState {
        AppState {
            client: Arc::new(ReadyApi),
            config: AppConfig {
                files_dir: files_dir.to_string_lossy().into_owned(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn analyze_stores_the_report_under_the_files_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_files_dir(dir.path());

        let response = analyze(
            State(state),
            Form(AnalyzeForm {
                host: "example.com".into(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let stored = std::fs::read(dir.path().join("ssl_report_example.com.pdf")).unwrap();
        assert!(stored.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the report directory should be makes the write fail.
        let blocking_file = dir.path().join("not-a-directory");
        std::fs::write(&blocking_file, b"occupied").unwrap();
        let state = state_with_files_dir(&blocking_file);

        let response = analyze(
            State(state),
            Form(AnalyzeForm {
                host: "example.com".into(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn each_user_visible_failure_gets_its_own_status() {
        let invalid = ReportError::Assess(AssessError::InvalidInput {
            host: "".into(),
            reason: "host must not be empty",
        });
        assert_eq!(status_for(&invalid), StatusCode::UNPROCESSABLE_ENTITY);

        let unavailable = ReportError::Assess(AssessError::ServiceUnavailable(
            ClientError::UnexpectedResponse("connection refused".into()),
        ));
        assert_eq!(status_for(&unavailable), StatusCode::SERVICE_UNAVAILABLE);

        let failed = ReportError::Assess(AssessError::AssessmentFailed {
            host: "example.com".into(),
            message: "unable to resolve domain name".into(),
        });
        assert_eq!(status_for(&failed), StatusCode::BAD_GATEWAY);

        let timeout = ReportError::Assess(AssessError::Timeout {
            host: "example.com".into(),
            waited: std::time::Duration::from_secs(300),
        });
        assert_eq!(status_for(&timeout), StatusCode::GATEWAY_TIMEOUT);

        let render = ReportError::Render(RenderError::NoEndpoints {
            host: "example.com".into(),
        });
        assert_eq!(status_for(&render), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn success_payload_omits_the_error_field() {
        let body = serde_json::to_string(&AnalyzeResponse {
            completed: true,
            name: Some("ssl_report_example.com.pdf".into()),
            result: Some("/files/ssl_report_example.com.pdf".into()),
            error: None,
        })
        .unwrap();
        assert!(body.contains("\"completed\":true"));
        assert!(!body.contains("error"));
    }
}
