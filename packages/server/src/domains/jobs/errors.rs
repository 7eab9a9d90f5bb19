use thiserror::Error;

use crate::common::{JobId, PhotoId};

/// Errors from the job administration and direct-upload activities.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("sector {sector} already exists on job {job_id}")]
    SectorExists { job_id: JobId, sector: i32 },

    #[error("job {0} is already complete")]
    JobClosed(JobId),

    #[error("decode_failed: {0}")]
    DecodeFailed(String),

    #[error("pipeline_crashed: {0:#}")]
    PipelineFailed(anyhow::Error),

    #[error("save_failed: {0:#}")]
    SaveFailed(anyhow::Error),

    #[error("sector {sector} was advanced concurrently")]
    Conflict { sector: i32 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Errors from background photo processing.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("validation pipeline failed: {0:#}")]
    Pipeline(anyhow::Error),

    #[error("document store error: {0:#}")]
    Store(anyhow::Error),

    #[error("sector {sector} moved from index {expected_index} to {current_index} during validation")]
    AdvanceConflict {
        sector: i32,
        expected_index: usize,
        current_index: usize,
    },

    #[error("photo {0} was already resolved")]
    PhotoAlreadyResolved(PhotoId),

    /// The job was deleted while the photo was in flight.
    #[error("job {0} no longer exists")]
    JobMissing(JobId),
}

impl ProcessError {
    /// Failures after which the worker should resend the same photo type.
    pub fn warrants_retake(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Pipeline(_) | Self::Store(_) | Self::AdvanceConflict { .. }
        )
    }
}

impl From<ProcessError> for JobError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Decode(msg) => JobError::DecodeFailed(msg),
            ProcessError::Pipeline(e) => JobError::PipelineFailed(e),
            ProcessError::AdvanceConflict { sector, .. } => JobError::Conflict { sector },
            ProcessError::JobMissing(id) => JobError::NotFound(id),
            ProcessError::Store(e) => JobError::Internal(e),
            other @ ProcessError::PhotoAlreadyResolved(_) => {
                JobError::Internal(anyhow::anyhow!(other.to_string()))
            }
        }
    }
}
