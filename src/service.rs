use chrono::Utc;
use tracing::info;

use crate::client::{AnalyzeApi, AssessError, AssessOptions};
use crate::models::Report;
use crate::report::{self, RenderError};

/// Everything that can go wrong between a hostname and a stored report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Assess(#[from] AssessError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Runs one full assess-and-render sequence for `host`.
///
/// The returned report is only ever built from a terminal READY assessment
/// with at least one endpoint; every failure surfaces as a typed error and
/// produces no document at all.
pub async fn generate_report<A: AnalyzeApi + ?Sized>(
    api: &A,
    host: &str,
    opts: &AssessOptions,
) -> Result<Report, ReportError> {
    let assessment = crate::client::assess_with(api, host, opts).await?;
    info!(
        host = %assessment.host,
        endpoints = assessment.endpoints.len(),
        "assessment complete, rendering report"
    );
    let report = report::render(&assessment, Utc::now())?;
    Ok(report)
}
