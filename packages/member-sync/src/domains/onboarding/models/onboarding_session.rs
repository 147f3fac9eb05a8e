use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::common::{member_id_keys, MemberId};
use crate::domains::member::models::MemberStatus;

/// Completed activity type granted for attending onboarding.
pub const ATTEND_ONBOARDING: &str = "attend_onboarding";

/// An uploaded in-person onboarding session.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingSession {
    pub id: Uuid,
    pub date: NaiveDate,
    pub uploaded_by_id: String,
    pub created_at: DateTime<Utc>,
}

/// The member fields onboarding decisions depend on.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct OnboardingAttendee {
    pub id: MemberId,
    pub email: String,
    pub status: MemberStatus,
    pub slack_id: Option<String>,
}

impl OnboardingSession {
    pub fn new(date: NaiveDate, uploaded_by_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            date,
            uploaded_by_id: uploaded_by_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Members onboarded in this session are stamped at noon UTC.
    pub fn onboarded_at(&self) -> Result<DateTime<Utc>> {
        self.date
            .and_hms_opt(12, 0, 0)
            .map(|at| at.and_utc())
            .with_context(|| format!("no noon on {}", self.date))
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, date, uploaded_by_id, created_at FROM onboarding_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn insert(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            "INSERT INTO onboarding_sessions (id, date, uploaded_by_id, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(self.id)
        .bind(self.date)
        .bind(&self.uploaded_by_id)
        .bind(self.created_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Record attendance rows. Repeated members are ignored.
    pub async fn add_attendees(&self, member_ids: &[MemberId], conn: &mut PgConnection) -> Result<u64> {
        let result = sqlx::query(
            "INSERT INTO onboarding_session_attendees (id, session_id, student_id)
             SELECT attendee_id, $1, student_id
             FROM UNNEST($2::uuid[], $3::text[]) AS t (attendee_id, student_id)
             ON CONFLICT (session_id, student_id) DO NOTHING",
        )
        .bind(self.id)
        .bind(member_ids.iter().map(|_| Uuid::now_v7()).collect::<Vec<_>>())
        .bind(member_id_keys(member_ids))
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Set `onboarded_at` for attendees who have never been onboarded.
    pub async fn mark_onboarded(&self, member_ids: &[MemberId], conn: &mut PgConnection) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE students
             SET onboarded_at = $1, updated_at = NOW()
             WHERE id = ANY($2) AND onboarded_at IS NULL",
        )
        .bind(self.onboarded_at()?)
        .bind(member_id_keys(member_ids))
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Grant attendance credit once per (member, session).
    ///
    /// Returns `false` when the credit already existed.
    pub async fn credit_attendance(session_id: Uuid, member_id: &MemberId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO completed_activities (id, student_id, activity_type, onboarding_session_id, occurred_at)
             SELECT $1, $2, $3, s.id, (s.date + TIME '12:00') AT TIME ZONE 'UTC'
             FROM onboarding_sessions s
             WHERE s.id = $4
             ON CONFLICT (student_id, onboarding_session_id) WHERE activity_type = 'attend_onboarding'
             DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(member_id)
        .bind(ATTEND_ONBOARDING)
        .bind(session_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

impl OnboardingAttendee {
    pub async fn find_by_ids(ids: &[MemberId], conn: &mut PgConnection) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT id, email, status, slack_id FROM students WHERE id = ANY($1) ORDER BY id",
        )
        .bind(member_id_keys(ids))
        .fetch_all(conn)
        .await
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn onboarded_at_is_noon_utc() {
        let session = OnboardingSession::new(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(), "admin-1");
        assert_eq!(
            session.onboarded_at().unwrap().to_rfc3339(),
            "2024-03-09T12:00:00+00:00"
        );
    }
}
