//! carepath-storage
//!
//! Repository traits the pipeline reads and writes through, plus two
//! backends: an in-memory store and an S3-backed document store.

pub mod activation;
pub mod artifacts;
pub mod client;
pub mod error;
pub mod memory;
pub mod objects;
pub mod s3;
pub mod traits;

pub use crate::activation::{ActivationPlan, StatusChange};
pub use crate::error::StoreError;
pub use crate::memory::MemoryStore;
pub use crate::s3::S3Store;
pub use crate::traits::{
    AnswerStore, ArtifactStore, BoxFuture, IntakeStore, JobStore, NotificationSink, ObjectStore,
    RuleStore, RunStore,
};
