//! Onboarding domain - session uploads, attendance credit, and implicit
//! reactivation of removed members who show up.

pub mod activities;
pub mod effects;
pub mod jobs;
pub mod models;

pub use jobs::OnboardingAttendedJob;
pub use models::{OnboardingAttendee, OnboardingSession};
