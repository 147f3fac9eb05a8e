mod record_attendance;
mod upload_session;

pub use record_attendance::record_attendance;
pub use upload_session::{upload_session, AttendeeAction, UploadedSession};
