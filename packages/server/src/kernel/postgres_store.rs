//! PostgreSQL document store.
//!
//! A job is a `jobs` row plus its `job_sectors` rows ordered by `ordinal`.
//! Every mutation is a single filtered statement, so concurrent writers
//! touching different sectors never overwrite each other.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::{JobId, PhotoId};
use crate::domains::jobs::models::{
    Job, JobRollup, JobStatus, Photo, PhotoChecks, PhotoFields, PhotoStatus, SectorProgress,
};
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::validation::Verdict;
use crate::kernel::{DocumentStore, JobStore, PhotoStore, SectorAdvance};

const JOB_COLUMNS: &str =
    "id, worker_phone, site_id, status, mac_id, rsn_id, azimuth_deg, created_at";
const SECTOR_COLUMNS: &str = "job_id, sector, required_types, current_index, status";
const PHOTO_COLUMNS: &str = "id, job_id, sector, photo_type, s3_key, phash, ocr_text, \
                             fields, checks, status, reason, created_at";

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: JobId,
    worker_phone: String,
    site_id: String,
    status: String,
    mac_id: Option<String>,
    rsn_id: Option<String>,
    azimuth_deg: Option<f64>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SectorRow {
    job_id: JobId,
    sector: i32,
    required_types: Vec<String>,
    current_index: i32,
    status: String,
}

impl SectorRow {
    fn into_progress(self) -> Result<SectorProgress> {
        Ok(SectorProgress {
            sector: self.sector,
            required_types: self.required_types.into_iter().map(PhotoType::from).collect(),
            current_index: self.current_index.max(0) as usize,
            status: self.status.parse()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PhotoRow {
    id: PhotoId,
    job_id: JobId,
    sector: i32,
    photo_type: String,
    s3_key: String,
    phash: Option<String>,
    ocr_text: Option<String>,
    fields: Json<PhotoFields>,
    checks: Json<PhotoChecks>,
    status: String,
    reason: Vec<String>,
    created_at: DateTime<Utc>,
}

impl PhotoRow {
    fn into_photo(self) -> Result<Photo> {
        Ok(Photo {
            id: self.id,
            job_id: self.job_id,
            sector: self.sector,
            photo_type: PhotoType::from(self.photo_type),
            s3_key: self.s3_key,
            phash: self.phash,
            ocr_text: self.ocr_text,
            fields: self.fields.0,
            checks: self.checks.0,
            status: self.status.parse()?,
            reason: self.reason,
            created_at: self.created_at,
        })
    }
}

fn type_strings(types: &[PhotoType]) -> Vec<String> {
    types.iter().map(|t| t.as_str().to_string()).collect()
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")
    }

    /// Attach sectors to job rows, preserving row order.
    async fn hydrate(&self, rows: Vec<JobRow>) -> Result<Vec<Job>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id.into_uuid()).collect();
        let sector_rows = sqlx::query_as::<_, SectorRow>(&format!(
            "SELECT {} FROM job_sectors WHERE job_id = ANY($1) ORDER BY ordinal",
            SECTOR_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut sectors: HashMap<JobId, Vec<SectorProgress>> = HashMap::new();
        for row in sector_rows {
            sectors
                .entry(row.job_id)
                .or_default()
                .push(row.into_progress()?);
        }

        rows.into_iter()
            .map(|row| {
                Ok(Job {
                    id: row.id,
                    sectors: sectors.remove(&row.id).unwrap_or_default(),
                    status: row.status.parse()?,
                    worker_phone: row.worker_phone,
                    site_id: row.site_id,
                    mac_id: row.mac_id,
                    rsn_id: row.rsn_id,
                    azimuth_deg: row.azimuth_deg,
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn hydrate_one(&self, row: Option<JobRow>) -> Result<Option<Job>> {
        Ok(self.hydrate(row.into_iter().collect()).await?.pop())
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    async fn find_job(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate_one(row).await
    }

    async fn find_job_for_site(&self, worker_phone: &str, site_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE worker_phone = $1 AND site_id = $2 \
             ORDER BY status = 'DONE', created_at DESC LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(worker_phone)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate_one(row).await
    }

    async fn find_active_job(&self, worker_phone: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE worker_phone = $1 \
             AND status IN ('PENDING', 'IN_PROGRESS') ORDER BY created_at LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(worker_phone)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate_one(row).await
    }

    async fn find_active_job_for_site(
        &self,
        worker_phone: &str,
        site_id: &str,
    ) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE worker_phone = $1 AND site_id = $2 \
             AND status IN ('PENDING', 'IN_PROGRESS') ORDER BY created_at LIMIT 1",
            JOB_COLUMNS
        ))
        .bind(worker_phone)
        .bind(site_id)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate_one(row).await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(rows).await
    }

    async fn insert_job(&self, job: &Job) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, worker_phone, site_id, status, mac_id, rsn_id, azimuth_deg, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(job.id)
        .bind(&job.worker_phone)
        .bind(&job.site_id)
        .bind(job.status.as_str())
        .bind(&job.mac_id)
        .bind(&job.rsn_id)
        .bind(job.azimuth_deg)
        .bind(job.created_at)
        .execute(&mut *tx)
        .await?;

        for sector in &job.sectors {
            sqlx::query(
                r#"
                INSERT INTO job_sectors (job_id, sector, required_types, current_index, status)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(job.id)
            .bind(sector.sector)
            .bind(type_strings(&sector.required_types))
            .bind(sector.current_index as i32)
            .bind(sector.status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn push_sector(&self, job_id: JobId, sector: &SectorProgress) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO job_sectors (job_id, sector, required_types, current_index, status)
            SELECT $1, $2, $3, $4, $5
            WHERE EXISTS (SELECT 1 FROM jobs WHERE id = $1)
            ON CONFLICT (job_id, sector) DO NOTHING
            "#,
        )
        .bind(job_id)
        .bind(sector.sector)
        .bind(type_strings(&sector.required_types))
        .bind(sector.current_index as i32)
        .bind(sector.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_job_status(&self, job_id: JobId, status: JobStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET status = $2 WHERE id = $1 AND status <> 'DONE'")
            .bind(job_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_rollup(&self, job_id: JobId, rollup: &JobRollup) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs SET
                mac_id = COALESCE($2, mac_id),
                rsn_id = COALESCE($3, rsn_id),
                azimuth_deg = COALESCE($4, azimuth_deg)
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(&rollup.mac_id)
        .bind(&rollup.rsn_id)
        .bind(rollup.azimuth_deg)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn advance_sector(
        &self,
        job_id: JobId,
        sector: i32,
        from_index: usize,
    ) -> Result<SectorAdvance> {
        let advanced = sqlx::query_as::<_, SectorRow>(&format!(
            r#"
            UPDATE job_sectors SET
                current_index = current_index + 1,
                status = CASE
                    WHEN current_index + 1 >= cardinality(required_types) THEN 'DONE'
                    ELSE 'IN_PROGRESS'
                END
            WHERE job_id = $1 AND sector = $2
              AND current_index = $3
              AND current_index < cardinality(required_types)
            RETURNING {}
            "#,
            SECTOR_COLUMNS
        ))
        .bind(job_id)
        .bind(sector)
        .bind(from_index as i32)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = advanced {
            return Ok(SectorAdvance::Advanced(row.into_progress()?));
        }

        let current: Option<i32> = sqlx::query_scalar(
            "SELECT current_index FROM job_sectors WHERE job_id = $1 AND sector = $2",
        )
        .bind(job_id)
        .bind(sector)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match current {
            Some(index) => SectorAdvance::Conflict {
                current_index: index.max(0) as usize,
            },
            None => SectorAdvance::Missing,
        })
    }

    async fn mark_sector_done(&self, job_id: JobId, sector: i32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE job_sectors SET status = 'DONE' WHERE job_id = $1 AND sector = $2",
        )
        .bind(job_id)
        .bind(sector)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_job(&self, job_id: JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PhotoStore for PostgresStore {
    async fn insert_photo(&self, photo: &Photo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO photos (id, job_id, sector, photo_type, s3_key, phash, ocr_text,
                                fields, checks, status, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(photo.id)
        .bind(photo.job_id)
        .bind(photo.sector)
        .bind(photo.photo_type.as_str())
        .bind(&photo.s3_key)
        .bind(&photo.phash)
        .bind(&photo.ocr_text)
        .bind(Json(&photo.fields))
        .bind(Json(&photo.checks))
        .bind(photo.status.as_str())
        .bind(&photo.reason)
        .bind(photo.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_photo(&self, id: PhotoId) -> Result<Option<Photo>> {
        sqlx::query_as::<_, PhotoRow>(&format!(
            "SELECT {} FROM photos WHERE id = $1",
            PHOTO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(PhotoRow::into_photo)
        .transpose()
    }

    async fn photos_for_job(&self, job_id: JobId, sector: Option<i32>) -> Result<Vec<Photo>> {
        sqlx::query_as::<_, PhotoRow>(&format!(
            "SELECT {} FROM photos WHERE job_id = $1 AND ($2::INTEGER IS NULL OR sector = $2) \
             ORDER BY ordinal",
            PHOTO_COLUMNS
        ))
        .bind(job_id)
        .bind(sector)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(PhotoRow::into_photo)
        .collect()
    }

    async fn prior_phashes(
        &self,
        job_id: JobId,
        sector: i32,
        photo_type: &PhotoType,
    ) -> Result<Vec<String>> {
        let hashes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT phash FROM photos
            WHERE job_id = $1 AND sector = $2 AND photo_type = $3
              AND status IN ('PASS', 'FAIL')
              AND phash IS NOT NULL
            ORDER BY ordinal
            "#,
        )
        .bind(job_id)
        .bind(sector)
        .bind(photo_type.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(hashes)
    }

    async fn resolve_photo(&self, id: PhotoId, verdict: &Verdict) -> Result<bool> {
        let status: PhotoStatus = verdict.status.into();
        let result = sqlx::query(
            r#"
            UPDATE photos SET
                photo_type = $2,
                phash = $3,
                ocr_text = $4,
                fields = $5,
                checks = $6,
                status = $7,
                reason = $8
            WHERE id = $1 AND status = 'PROCESSING'
            "#,
        )
        .bind(id)
        .bind(verdict.photo_type.as_str())
        .bind(&verdict.phash)
        .bind(&verdict.ocr_text)
        .bind(Json(&verdict.fields))
        .bind(Json(&verdict.checks))
        .bind(status.as_str())
        .bind(verdict.stored_reasons())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_photos_for_job(&self, job_id: JobId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM photos WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
