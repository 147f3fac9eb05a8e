use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, PgPool, Postgres, Type};
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::common::{member_id_keys, MemberId};

// ============================================================================
// Status
// ============================================================================

/// Membership status. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
    BulkRemoved,
    /// Reserved. Storable, but no side effects are defined for it yet.
    Banned,
}

impl MemberStatus {
    pub const ALL: [MemberStatus; 4] = [
        MemberStatus::Active,
        MemberStatus::Inactive,
        MemberStatus::BulkRemoved,
        MemberStatus::Banned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
            MemberStatus::BulkRemoved => "bulk_removed",
            MemberStatus::Banned => "banned",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown member status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for MemberStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemberStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl Type<Postgres> for MemberStatus {
    fn type_info() -> PgTypeInfo {
        <&str as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <&str as Type<Postgres>>::compatible(ty)
    }
}

impl Encode<'_, Postgres> for MemberStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> Decode<'r, Postgres> for MemberStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as Decode<Postgres>>::decode(value)?;
        Ok(raw.parse()?)
    }
}

// ============================================================================
// Member
// ============================================================================

/// Member model - SQL persistence layer
///
/// A member starts out ACTIVE unless imported with another status. After
/// creation, status changes only through [`Member::batch_update_status`].
#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Member {
    #[builder(default = MemberId::generate())]
    pub id: MemberId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,

    #[builder(default = MemberStatus::Active)]
    pub status: MemberStatus,

    // External system correlation keys
    #[builder(default, setter(strip_option))]
    pub airtable_id: Option<String>,
    #[builder(default, setter(strip_option))]
    pub slack_id: Option<String>,

    #[builder(default, setter(strip_option))]
    pub onboarded_at: Option<DateTime<Utc>>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

/// Correlation data for a member whose status was just written.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct UpdatedMember {
    pub id: MemberId,
    pub airtable_id: Option<String>,
    pub email: String,
    pub first_name: String,
    pub slack_id: Option<String>,
}

const MEMBER_COLUMNS: &str = "id, email, first_name, last_name, status, airtable_id, slack_id, onboarded_at, created_at, updated_at";

impl Member {
    /// Find member by ID
    pub async fn find_by_id(id: &MemberId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!("SELECT {MEMBER_COLUMNS} FROM students WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Find an ACTIVE member by email, ignoring case.
    pub async fn find_active_by_email(email: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM students WHERE LOWER(email) = LOWER($1) AND status = $2"
        ))
        .bind(email.trim())
        .bind(MemberStatus::Active)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_ids(ids: &[MemberId], pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM students WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(member_id_keys(ids))
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Insert new member
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(&format!(
            "INSERT INTO students (
                id, email, first_name, last_name, status, airtable_id, slack_id,
                onboarded_at, created_at, updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(&self.id)
        .bind(&self.email)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(self.status)
        .bind(&self.airtable_id)
        .bind(&self.slack_id)
        .bind(self.onboarded_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Set `status` for every listed member in one transaction.
    ///
    /// Returns correlation data for the rows actually updated; unknown ids
    /// are skipped. Any database error rolls back the whole batch.
    pub async fn batch_update_status(
        ids: &[MemberId],
        status: MemberStatus,
        pool: &PgPool,
    ) -> Result<Vec<UpdatedMember>> {
        let mut tx = pool.begin().await?;

        let updated = sqlx::query_as::<_, UpdatedMember>(
            "UPDATE students
             SET status = $1, updated_at = NOW()
             WHERE id = ANY($2)
             RETURNING id, airtable_id, email, first_name, slack_id",
        )
        .bind(status)
        .bind(member_id_keys(ids))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }
}
