//! Validation domain - turns one image into a verdict.
//!
//! The pipeline itself is an infrastructure seam (`kernel::BaseValidationPipeline`);
//! this module holds the verdict contract, image helpers, and the two
//! implementations wired at startup.

pub mod imaging;
pub mod local;
pub mod remote;
pub mod verdict;

pub use local::LocalValidationPipeline;
pub use remote::RemoteValidationPipeline;
pub use verdict::{PipelineContext, Verdict, VerdictStatus};
