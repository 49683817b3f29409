use std::sync::Arc;

use carepath_storage::{
    AnswerStore, ArtifactStore, IntakeStore, JobStore, NotificationSink, ObjectStore, RuleStore,
    RunStore,
};

/// Every repository the pipeline reads or writes, each behind its own trait object.
///
/// Usually all fields point at one backend (see [`Stores::from_backend`]);
/// they are separate so a single concern can be swapped or wrapped.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub rules: Arc<dyn RuleStore>,
    pub runs: Arc<dyn RunStore>,
    pub answers: Arc<dyn AnswerStore>,
    pub intake: Arc<dyn IntakeStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub notifications: Arc<dyn NotificationSink>,
}

impl Stores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: JobStore
            + ArtifactStore
            + RuleStore
            + RunStore
            + AnswerStore
            + IntakeStore
            + ObjectStore
            + NotificationSink
            + 'static,
    {
        Self {
            jobs: backend.clone(),
            artifacts: backend.clone(),
            rules: backend.clone(),
            runs: backend.clone(),
            answers: backend.clone(),
            intake: backend.clone(),
            objects: backend.clone(),
            notifications: backend,
        }
    }
}
