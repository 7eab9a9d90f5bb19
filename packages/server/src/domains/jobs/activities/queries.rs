//! Read-side job activities for the admin API.

use serde::Serialize;
use tracing::warn;

use crate::common::JobId;
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::models::{Job, Photo};
use crate::domains::jobs::photo_types::{required_types_for_sector, type_label, PhotoType};
use crate::kernel::ServerDeps;

/// A photo with a short-lived URL derived from its blob key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoView {
    #[serde(flatten)]
    pub photo: Photo,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    pub photos: Vec<PhotoView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeTemplate {
    #[serde(rename = "type")]
    pub photo_type: PhotoType,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorTemplate {
    pub sector: i32,
    pub required_types: Vec<TypeTemplate>,
}

pub async fn list_jobs(deps: &ServerDeps) -> Result<Vec<Job>, JobError> {
    Ok(deps.store.list_jobs().await?)
}

/// Job with its photos oldest first, optionally limited to one sector.
pub async fn get_job(
    job_id: JobId,
    sector: Option<i32>,
    deps: &ServerDeps,
) -> Result<JobDetail, JobError> {
    let job = deps
        .store
        .find_job(job_id)
        .await?
        .ok_or(JobError::NotFound(job_id))?;

    let photos = deps
        .store
        .photos_for_job(job_id, sector)
        .await?
        .into_iter()
        .map(|photo| {
            let url = match deps.blobs.presign(&photo.s3_key, deps.presign_ttl) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(photo_id = %photo.id, error = %e, "Could not presign photo");
                    None
                }
            };
            PhotoView { photo, url }
        })
        .collect();

    Ok(JobDetail { job, photos })
}

pub fn sector_template(sector: i32) -> SectorTemplate {
    SectorTemplate {
        sector,
        required_types: required_types_for_sector(sector)
            .into_iter()
            .map(|photo_type| TypeTemplate {
                label: type_label(&photo_type),
                photo_type,
            })
            .collect(),
    }
}
