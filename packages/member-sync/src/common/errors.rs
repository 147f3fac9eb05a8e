use thiserror::Error;

use crate::common::MemberId;
use crate::domains::member::models::MemberStatus;

/// Pipeline-level failures. None of these succeed on retry.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Batch status update requires at least one member id")]
    EmptyBatch,

    #[error("No route defined for member status '{0}'")]
    UnroutableStatus(MemberStatus),

    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),

    #[error("Invalid payload for {job_type}: {message}")]
    InvalidPayload { job_type: String, message: String },

    #[error("Unknown job type: {0}")]
    UnknownJobType(String),
}
