// HTTP routes
pub mod health;
pub mod members;
pub mod onboarding;

pub use health::*;
pub use members::*;
pub use onboarding::*;
