//! Member domain - status writes and status-change propagation.
//!
//! ```text
//! admin action / onboarding → student.batch_update_status
//!   → students table (single writer)
//!   → student.status_updated per member
//!   → routing table → side-effect jobs in other domains
//! ```

pub mod activities;
pub mod effects;
pub mod jobs;
pub mod models;
pub mod routing;

pub use models::{Member, MemberStatus, UpdatedMember};
