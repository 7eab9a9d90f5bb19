// Business domains
pub mod jobs;
pub mod validation;
