//! Member status endpoints. Each one submits batch update jobs and answers
//! 202 Accepted; the status write happens in the job runner.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::MemberId;
use crate::domains::member::activities::{self, SubmitSummary};
use crate::domains::member::models::MemberStatus;
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitStatusRequest {
    pub member_ids: Vec<MemberId>,
    pub status: MemberStatus,
    #[serde(default)]
    pub send_violation_email: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub status: MemberStatus,
    #[serde(default)]
    pub send_violation_email: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedResponse {
    pub members: usize,
    pub jobs: usize,
}

impl From<SubmitSummary> for SubmittedResponse {
    fn from(summary: SubmitSummary) -> Self {
        Self {
            members: summary.members,
            jobs: summary.chunks,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmittedResponse {
    pub job_id: Uuid,
    pub duplicate: bool,
}

/// `POST /members/status`
pub async fn submit_status_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<SubmitStatusRequest>,
) -> Result<(StatusCode, Json<SubmittedResponse>), ApiError> {
    let summary = activities::submit_status_changes(
        request.member_ids,
        request.status,
        request.send_violation_email,
        &state.deps,
    )
    .await?;

    Ok((StatusCode::ACCEPTED, Json(summary.into())))
}

/// `POST /members/:id/status`
pub async fn change_status_handler(
    Extension(state): Extension<AppState>,
    Path(member_id): Path<String>,
    Json(request): Json<ChangeStatusRequest>,
) -> Result<(StatusCode, Json<JobSubmittedResponse>), ApiError> {
    let result = activities::change_member_status(
        MemberId::new(member_id),
        request.status,
        request.send_violation_email,
        &state.deps,
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobSubmittedResponse {
            job_id: result.job_id(),
            duplicate: !result.is_created(),
        }),
    ))
}

/// `POST /members/bulk-remove` with a plain-text body, one member id per line.
pub async fn bulk_remove_handler(
    Extension(state): Extension<AppState>,
    body: String,
) -> Result<(StatusCode, Json<SubmittedResponse>), ApiError> {
    let member_ids = activities::parse_member_ids(&body);
    let summary = activities::bulk_remove(member_ids, &state.deps).await?;

    Ok((StatusCode::ACCEPTED, Json(summary.into())))
}
