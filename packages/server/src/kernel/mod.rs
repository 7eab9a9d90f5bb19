//! Kernel module - server infrastructure and dependencies.

pub mod blob_store;
pub mod deps;
pub mod memory_store;
pub mod postgres_store;
pub mod sector_locks;
pub mod test_dependencies;
pub mod traits;

pub use blob_store::{LocalBlobStore, MemoryBlobStore, UrlSigner};
pub use deps::{HttpMediaFetcher, LoggingNotifier, ServerDeps, TwilioAdapter};
pub use memory_store::MemoryStore;
pub use postgres_store::PostgresStore;
pub use sector_locks::SectorLocks;
pub use test_dependencies::TestDependencies;
pub use traits::*;
