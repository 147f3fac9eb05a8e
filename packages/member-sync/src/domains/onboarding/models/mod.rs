pub mod onboarding_session;

pub use onboarding_session::{OnboardingAttendee, OnboardingSession, ATTEND_ONBOARDING};
