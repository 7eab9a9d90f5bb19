//! `PostgresStore` against a real database.
//!
//! Needs Docker. Run with: cargo test --test postgres_store_tests -- --ignored

use anyhow::{Context, Result};
use fieldlens_core::common::JobId;
use fieldlens_core::domains::jobs::{
    Job, JobStatus, Photo, PhotoStatus, PhotoType, SectorProgress, SectorStatus,
};
use fieldlens_core::domains::validation::{Verdict, VerdictStatus};
use fieldlens_core::kernel::{JobStore, PhotoStore, PostgresStore, SectorAdvance};
use sqlx::postgres::PgPoolOptions;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// One container and one migration run for the whole file.
struct SharedDatabase {
    db_url: String,
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_DB: OnceCell<SharedDatabase> = OnceCell::const_new();

impl SharedDatabase {
    async fn init() -> Result<Self> {
        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .context("Failed to start Postgres container")?;
        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new().max_connections(2).connect(&db_url).await?;
        PostgresStore::new(pool).migrate().await?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }
}

/// Each test gets its own pool; tokio tests do not share a runtime.
async fn store() -> PostgresStore {
    let shared = SHARED_DB
        .get_or_init(|| async {
            SharedDatabase::init()
                .await
                .expect("Failed to initialize shared test database")
        })
        .await;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&shared.db_url)
        .await
        .expect("connect");
    PostgresStore::new(pool)
}

async fn seed(store: &PostgresStore, phone: &str, types: &[PhotoType]) -> Job {
    let job = Job::new(phone, "SITE", SectorProgress::with_types(1, types.to_vec()));
    store.insert_job(&job).await.expect("insert job");
    job
}

fn verdict(photo_type: PhotoType, status: VerdictStatus, phash: &str) -> Verdict {
    Verdict {
        photo_type,
        status,
        phash: Some(phash.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn job_round_trips_with_sectors() {
    let store = store().await;
    let job = seed(&store, "pg-1", &[PhotoType::labelling(), PhotoType::azimuth()]).await;

    let loaded = store.find_job(job.id).await.unwrap().unwrap();

    assert_eq!(loaded.worker_phone, "pg-1");
    assert_eq!(loaded.status, JobStatus::Pending);
    assert_eq!(loaded.sectors, job.sectors);
    assert_eq!(
        store.find_active_job("pg-1").await.unwrap().map(|j| j.id),
        Some(job.id)
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn advance_is_compare_and_increment() {
    let store = store().await;
    let job = seed(&store, "pg-2", &[PhotoType::labelling(), PhotoType::azimuth()]).await;

    let first = store.advance_sector(job.id, 1, 0).await.unwrap();
    let stale = store.advance_sector(job.id, 1, 0).await.unwrap();

    let SectorAdvance::Advanced(sector) = first else {
        panic!("expected advance, got {:?}", first);
    };
    assert_eq!(sector.current_index, 1);
    assert_eq!(sector.status, SectorStatus::InProgress);
    assert_eq!(stale, SectorAdvance::Conflict { current_index: 1 });

    store.advance_sector(job.id, 1, 1).await.unwrap();
    let exhausted = store.advance_sector(job.id, 1, 2).await.unwrap();
    assert_eq!(exhausted, SectorAdvance::Conflict { current_index: 2 });

    assert_eq!(
        store.advance_sector(job.id, 9, 0).await.unwrap(),
        SectorAdvance::Missing
    );
    assert_eq!(
        store.advance_sector(JobId::new(), 1, 0).await.unwrap(),
        SectorAdvance::Missing
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn duplicate_sector_is_not_pushed() {
    let store = store().await;
    let job = seed(&store, "pg-3", &[PhotoType::labelling()]).await;

    assert!(store.push_sector(job.id, &SectorProgress::new(2)).await.unwrap());
    assert!(!store.push_sector(job.id, &SectorProgress::new(2)).await.unwrap());

    let numbers: Vec<i32> = store
        .find_job(job.id)
        .await
        .unwrap()
        .unwrap()
        .sectors
        .iter()
        .map(|s| s.sector)
        .collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn done_job_never_regresses() {
    let store = store().await;
    let job = seed(&store, "pg-4", &[PhotoType::labelling()]).await;

    assert!(store.set_job_status(job.id, JobStatus::Done).await.unwrap());
    assert!(!store.set_job_status(job.id, JobStatus::InProgress).await.unwrap());

    assert_eq!(
        store.find_job(job.id).await.unwrap().unwrap().status,
        JobStatus::Done
    );
    assert!(store.find_active_job("pg-4").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn prior_phashes_are_scoped_to_sector_and_type() {
    let store = store().await;
    let job = seed(&store, "pg-5", &[PhotoType::labelling(), PhotoType::azimuth()]).await;
    store.push_sector(job.id, &SectorProgress::new(2)).await.unwrap();

    for (sector, photo_type, phash) in [
        (1, PhotoType::labelling(), "aaaa"),
        (1, PhotoType::azimuth(), "bbbb"),
        (2, PhotoType::labelling(), "cccc"),
    ] {
        let photo = Photo::resolved(
            job.id,
            sector,
            format!("jobs/{}/raw/{}.jpg", job.id, phash),
            &verdict(photo_type, VerdictStatus::Pass, phash),
        );
        store.insert_photo(&photo).await.unwrap();
    }
    // A placeholder has no hash and must not count.
    let pending = Photo::placeholder(
        job.id,
        1,
        PhotoType::labelling(),
        format!("jobs/{}/raw/pending.jpg", job.id),
    );
    store.insert_photo(&pending).await.unwrap();

    let hashes = store
        .prior_phashes(job.id, 1, &PhotoType::labelling())
        .await
        .unwrap();
    assert_eq!(hashes, vec!["aaaa".to_string()]);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn placeholder_resolves_exactly_once() {
    let store = store().await;
    let job = seed(&store, "pg-6", &[PhotoType::labelling()]).await;
    let photo = Photo::placeholder(
        job.id,
        1,
        PhotoType::labelling(),
        format!("jobs/{}/raw/once.jpg", job.id),
    );
    store.insert_photo(&photo).await.unwrap();

    let pass = verdict(PhotoType::labelling(), VerdictStatus::Pass, "dddd");
    assert!(store.resolve_photo(photo.id, &pass).await.unwrap());
    let fail = verdict(PhotoType::labelling(), VerdictStatus::Fail, "eeee");
    assert!(!store.resolve_photo(photo.id, &fail).await.unwrap());

    let stored = store.find_photo(photo.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PhotoStatus::Pass);
    assert_eq!(stored.phash.as_deref(), Some("dddd"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn site_lookup_prefers_open_job() {
    let store = store().await;
    let done = seed(&store, "pg-7", &[PhotoType::labelling()]).await;
    store.set_job_status(done.id, JobStatus::Done).await.unwrap();
    let open = seed(&store, "pg-7", &[PhotoType::labelling()]).await;

    let found = store.find_job_for_site("pg-7", "SITE").await.unwrap().unwrap();

    assert_eq!(found.id, open.id);
}
