use tracing::info;

use crate::common::JobId;
use crate::domains::jobs::errors::JobError;
use crate::kernel::ServerDeps;

/// Delete a job and every photo it owns. Blobs are left in place.
pub async fn delete_job(job_id: JobId, deps: &ServerDeps) -> Result<(), JobError> {
    if deps.store.find_job(job_id).await?.is_none() {
        return Err(JobError::NotFound(job_id));
    }

    let photos = deps.store.delete_photos_for_job(job_id).await?;
    deps.store.delete_job(job_id).await?;

    info!(job_id = %job_id, photos, "Job deleted");
    Ok(())
}
