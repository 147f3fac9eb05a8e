use axum::{extract::Extension, http::StatusCode, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::MemberId;
use crate::domains::onboarding::activities::{upload_session, AttendeeAction};
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionRequest {
    pub date: NaiveDate,
    pub uploaded_by_id: String,
    pub attendee_ids: Vec<MemberId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionResponse {
    pub session_id: Uuid,
    pub attendees: usize,
    pub reactivated: usize,
    pub invited: usize,
}

/// `POST /onboarding-sessions`
pub async fn upload_onboarding_session_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<UploadSessionRequest>,
) -> Result<(StatusCode, Json<UploadSessionResponse>), ApiError> {
    let uploaded = upload_session(
        request.date,
        &request.uploaded_by_id,
        request.attendee_ids,
        &state.deps,
    )
    .await?;

    let count = |action: AttendeeAction| {
        uploaded
            .attendees
            .iter()
            .filter(|(_, a)| *a == action)
            .count()
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadSessionResponse {
            session_id: uploaded.session_id,
            attendees: uploaded.attendees.len(),
            reactivated: count(AttendeeAction::Reactivated),
            invited: count(AttendeeAction::InvitedToChat),
        }),
    ))
}
