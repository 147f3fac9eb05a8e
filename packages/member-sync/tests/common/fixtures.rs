//! Test fixtures for creating test data.
//!
//! These fixtures use the model methods directly to create test data.

use anyhow::Result;
use member_sync::common::MemberId;
use member_sync::domains::member::models::{Member, MemberStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a member with correlation keys for every external system.
pub async fn create_member(
    pool: &PgPool,
    first_name: &str,
    status: MemberStatus,
    slack_id: Option<&str>,
) -> Result<Member> {
    let suffix = Uuid::new_v4().simple().to_string();
    let email = format!("{}.{}@example.com", first_name.to_lowercase(), &suffix[..8]);

    let member = Member::builder()
        .email(email)
        .first_name(first_name)
        .last_name("Tester")
        .status(status)
        .build();
    let member = Member {
        airtable_id: Some(format!("rec{}", &suffix[..10])),
        slack_id: slack_id.map(String::from),
        ..member
    };

    member.insert(pool).await
}

pub async fn create_active_member(pool: &PgPool, first_name: &str) -> Result<Member> {
    create_member(pool, first_name, MemberStatus::Active, Some("U0001")).await
}

/// Current status as stored.
pub async fn status_of(pool: &PgPool, id: &MemberId) -> Result<MemberStatus> {
    let member = Member::find_by_id(id, pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("member {id} not found"))?;
    Ok(member.status)
}

/// Engagement captured by email before the member was linked.
pub async fn create_unlinked_engagement(pool: &PgPool, email: &str) -> Result<()> {
    sqlx::query("INSERT INTO event_attendees (id, event_id, email) VALUES ($1, 'evt-1', $2)")
        .bind(Uuid::new_v4())
        .bind(email.to_uppercase())
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO survey_responses (id, survey_id, email) VALUES ($1, 'srv-1', $2)")
        .bind(Uuid::new_v4())
        .bind(email)
        .execute(pool)
        .await?;
    Ok(())
}
