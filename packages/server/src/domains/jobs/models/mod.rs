pub mod job;
pub mod photo;

pub use job::{Job, JobRollup, JobStatus, ProgressStatus, SectorProgress, SectorStatus};
pub use photo::{Photo, PhotoChecks, PhotoFields, PhotoStatus};
