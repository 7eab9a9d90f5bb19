//! Typed ID definitions for the persisted entities.
//!
//! `JobId` and `PhotoId` are distinct types, so a photo id can never be
//! passed where a job id is expected.

pub use super::id::Id;

/// Marker type for Job entities (worker + site assignments).
pub struct Job;

/// Marker type for Photo entities.
pub struct Photo;

/// Typed ID for Job entities.
pub type JobId = Id<Job>;

/// Typed ID for Photo entities.
///
/// V7, so ids sort in insertion order.
pub type PhotoId = Id<Photo>;
