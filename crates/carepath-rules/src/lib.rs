//! carepath-rules
//!
//! Versioned rule and configuration documents: the registry that owns their
//! draft → active → archived lifecycle, the activation guard, the safety rule
//! engine, and the scoring configuration schema consumed by the risk and
//! ranking stages.

pub mod engine;
pub mod error;
pub mod guard;
pub mod logic;
pub mod registry;
pub mod scoring;

pub use crate::engine::{RuleSelection, SafetyVerdict, evaluate};
pub use crate::error::{ConsistencyIssue, EngineError, RegistryError};
pub use crate::guard::GuardIssue;
pub use crate::registry::{Activation, RuleRegistry};
pub use crate::scoring::{SCORING_CONFIG_KEY, ScoringConfig, ScoringDefaults};
