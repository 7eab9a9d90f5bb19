//! Job administration endpoints.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::common::JobId;
use crate::domains::jobs::activities::{
    self, create_or_extend_job, get_job, list_jobs, JobDetail, SectorTemplate,
};
use crate::domains::jobs::{Job, JobError};
use crate::server::app::AxumAppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub worker_phone: String,
    pub site_id: String,
    pub sector: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct SectorFilter {
    pub sector: Option<i32>,
}

pub async fn list_jobs_handler(
    Extension(state): Extension<AxumAppState>,
) -> Result<Json<Vec<Job>>, JobError> {
    Ok(Json(list_jobs(&state.deps).await?))
}

pub async fn create_job_handler(
    Extension(state): Extension<AxumAppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), JobError> {
    let job = create_or_extend_job(
        &request.worker_phone,
        &request.site_id,
        request.sector,
        &state.deps,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn get_job_handler(
    Extension(state): Extension<AxumAppState>,
    Path(id): Path<Uuid>,
    Query(filter): Query<SectorFilter>,
) -> Result<Json<JobDetail>, JobError> {
    let detail = get_job(JobId::from_uuid(id), filter.sector, &state.deps).await?;
    Ok(Json(detail))
}

pub async fn delete_job_handler(
    Extension(state): Extension<AxumAppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, JobError> {
    activities::delete_job(JobId::from_uuid(id), &state.deps).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn sector_template_handler(Path(sector): Path<i32>) -> Json<SectorTemplate> {
    Json(activities::sector_template(sector))
}
