//! Background jobs for the member domain.
//!
//! ```text
//! BatchUpdateStatusJob  → write status for N members → N × StatusUpdatedJob
//! StatusUpdatedJob      → route by status            → side-effect jobs
//! EngagementBackfillJob → link historical engagement → terminal
//! ```

mod batch_update_status;
mod engagement_backfill;
mod status_updated;

pub use batch_update_status::{BatchUpdateStatusJob, RECOMMENDED_BATCH_SIZE};
pub use engagement_backfill::EngagementBackfillJob;
pub use status_updated::StatusUpdatedJob;
