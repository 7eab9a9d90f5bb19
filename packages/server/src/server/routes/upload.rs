//! Multipart direct upload (`/debug/upload`).

use axum::{
    extract::{Extension, Multipart},
    Json,
};
use bytes::Bytes;

use crate::domains::jobs::activities::{direct_upload, DirectUpload, UploadResult};
use crate::domains::jobs::JobError;
use crate::server::app::AxumAppState;

#[derive(Default)]
struct UploadForm {
    worker_phone: Option<String>,
    site_id: Option<String>,
    sector: Option<String>,
    file: Option<Bytes>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, JobError> {
        let bad_form = |e: axum::extract::multipart::MultipartError| {
            JobError::Validation(format!("invalid multipart body: {}", e))
        };

        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "workerPhone" => form.worker_phone = Some(field.text().await.map_err(bad_form)?),
                "siteId" => form.site_id = Some(field.text().await.map_err(bad_form)?),
                "sector" => form.sector = Some(field.text().await.map_err(bad_form)?),
                "file" => form.file = Some(field.bytes().await.map_err(bad_form)?),
                _ => {}
            }
        }
        Ok(form)
    }

    fn into_upload(self) -> Result<DirectUpload, JobError> {
        let missing = |name: &str| JobError::Validation(format!("{} is required", name));

        let sector = self
            .sector
            .ok_or_else(|| missing("sector"))?
            .trim()
            .parse::<i32>()
            .map_err(|_| JobError::Validation("sector must be an integer".to_string()))?;
        let bytes = self.file.filter(|b| !b.is_empty()).ok_or_else(|| missing("file"))?;

        Ok(DirectUpload {
            worker_phone: self.worker_phone.ok_or_else(|| missing("workerPhone"))?,
            site_id: self.site_id.ok_or_else(|| missing("siteId"))?,
            sector,
            bytes,
        })
    }
}

pub async fn debug_upload_handler(
    Extension(state): Extension<AxumAppState>,
    multipart: Multipart,
) -> Result<Json<UploadResult>, JobError> {
    let upload = UploadForm::read(multipart).await?.into_upload()?;
    Ok(Json(direct_upload(upload, &state.deps).await?))
}
