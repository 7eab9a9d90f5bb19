//! Jobs domain activities - the operations behind the HTTP routes and the
//! background validation task.

pub mod create_job;
pub mod delete_job;
pub mod direct_upload;
pub mod ingest_photo;
pub mod process_photo;
pub mod progression;
pub mod queries;

pub use create_job::create_or_extend_job;
pub use delete_job::delete_job;
pub use direct_upload::{direct_upload, DirectUpload, UploadResult};
pub use ingest_photo::{ingest_inbound_photo, InboundPhoto, IngestOutcome};
pub use process_photo::{
    process_photo, process_photo_and_notify, schedule_photo_processing, ProcessPhotoRequest,
    ProcessedPhoto,
};
pub use queries::{get_job, list_jobs, sector_template, JobDetail, PhotoView, SectorTemplate};
