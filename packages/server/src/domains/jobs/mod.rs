//! Jobs domain - sector progression for field photo collection
//!
//! A job is a worker + site assignment made of sectors. Each sector walks an
//! ordered checklist of photo types; a photo advances the checklist only when
//! validation passes with exactly the expected type.
//!
//! Flow:
//!   webhook → activities::ingest_inbound_photo (placeholder photo, fast reply)
//!           → activities::process_photo_and_notify (background: validate,
//!             advance, notify)

pub mod activities;
pub mod errors;
pub mod messages;
pub mod models;
pub mod photo_types;
pub mod selector;

pub use errors::{JobError, ProcessError};
pub use models::{Job, JobRollup, JobStatus, Photo, PhotoChecks, PhotoFields, PhotoStatus, SectorProgress, SectorStatus};
pub use photo_types::PhotoType;
