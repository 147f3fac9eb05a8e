// Member Sync - status-change propagation pipeline
//
// Member status is written by one batch updater. Each change becomes a
// durable event job that fans out into independent side-effect jobs for the
// record system, mailing list, chat workspace, and notifications.
//
// Domains live in domains/*; the job queue and vendor clients in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
