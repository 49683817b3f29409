//! carepath-pipeline
//!
//! The seven assessment stages (risk, ranking, content, safety, validation,
//! delivery, pdf), the job gating that sequences them, and the diagnosis-run
//! dedup policy. Everything is reached through [`Pipeline`].

pub mod dedup;
pub mod envelope;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod settings;
pub mod stages;
pub mod stores;

pub use crate::envelope::StageEnvelope;
pub use crate::error::{ErrorCode, PipelineError, StageFailure, StageResult};
pub use crate::pipeline::{Pipeline, StageArgs};
pub use crate::settings::PipelineSettings;
pub use crate::stores::Stores;
