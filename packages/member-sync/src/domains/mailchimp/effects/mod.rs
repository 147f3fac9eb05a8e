pub mod job_handlers;

pub use job_handlers::register_mailchimp_jobs;
