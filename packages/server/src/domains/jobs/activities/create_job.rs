use tracing::info;

use crate::common::utils::normalize_phone;
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::models::{Job, JobStatus, SectorProgress};
use crate::kernel::ServerDeps;

/// Trimmed, non-empty `(phone, site)` pair, with the phone normalized.
pub(crate) fn worker_and_site(worker_phone: &str, site_id: &str) -> Result<(String, String), JobError> {
    let site_id = site_id.trim();
    if worker_phone.trim().is_empty() || site_id.is_empty() {
        return Err(JobError::Validation(
            "workerPhone and siteId are required".to_string(),
        ));
    }
    let phone = normalize_phone(worker_phone);
    if phone.is_empty() {
        return Err(JobError::Validation(
            "workerPhone must contain digits".to_string(),
        ));
    }
    Ok((phone, site_id.to_string()))
}

/// Create a job for (worker, site), or append `sector` to the existing one.
///
/// Appending a sector that already exists is rejected rather than creating a
/// second copy; so is appending to a job that is already complete.
pub async fn create_or_extend_job(
    worker_phone: &str,
    site_id: &str,
    sector: i32,
    deps: &ServerDeps,
) -> Result<Job, JobError> {
    let (phone, site_id) = worker_and_site(worker_phone, site_id)?;

    let Some(existing) = deps.store.find_job_for_site(&phone, &site_id).await? else {
        let job = Job::new(phone, site_id, SectorProgress::new(sector));
        deps.store.insert_job(&job).await?;
        info!(job_id = %job.id, site_id = %job.site_id, sector, "Job created");
        return Ok(job);
    };

    if existing.status == JobStatus::Done {
        return Err(JobError::JobClosed(existing.id));
    }
    let duplicate = JobError::SectorExists {
        job_id: existing.id,
        sector,
    };
    if existing.has_sector(sector) {
        return Err(duplicate);
    }
    if !deps
        .store
        .push_sector(existing.id, &SectorProgress::new(sector))
        .await?
    {
        return Err(duplicate);
    }

    info!(job_id = %existing.id, sector, "Sector added to job");
    deps.store
        .find_job(existing.id)
        .await?
        .ok_or(JobError::NotFound(existing.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_inputs() {
        assert!(matches!(
            worker_and_site("  ", "S1"),
            Err(JobError::Validation(_))
        ));
        assert!(matches!(
            worker_and_site("+91 98", " "),
            Err(JobError::Validation(_))
        ));
        assert!(matches!(
            worker_and_site("whatsapp:", "S1"),
            Err(JobError::Validation(_))
        ));
    }

    #[test]
    fn normalizes_phone_and_trims_site() {
        let (phone, site) = worker_and_site("whatsapp:+91 98765-43210", "  SITE-9 ").unwrap();
        assert_eq!(phone, "919876543210");
        assert_eq!(site, "SITE-9");
    }
}
