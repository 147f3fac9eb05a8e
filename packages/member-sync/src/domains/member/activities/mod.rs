//! Member domain activities - business logic called by job handlers and routes.

mod backfill_engagement;
mod route_status_update;
mod update_status;

pub use backfill_engagement::{backfill_engagement, BackfillOutcome};
pub use route_status_update::{route_status_update, RouteOutcome};
pub use update_status::{
    apply_batch_update, bulk_remove, change_member_status, parse_member_ids, submit_status_changes,
    BatchUpdateOutcome, SubmitSummary,
};
