#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Value, json};
use uuid::Uuid;

use carepath_core::models::artifact::ArtifactKind;
use carepath_core::models::intake::{ConversationTurn, IntakeData, Speaker};
use carepath_core::models::job::{ProcessingJob, Stage};
use carepath_core::models::risk::Answer;
use carepath_core::models::rule::{RuleKind, RuleVersion};
use carepath_pipeline::{Pipeline, PipelineSettings, StageArgs, Stores};
use carepath_storage::{ArtifactStore, BoxFuture, MemoryStore, StoreError};

pub fn answer(question_id: &str, value: f64, max_value: f64) -> Answer {
    Answer {
        question_id: question_id.to_string(),
        value,
        max_value,
    }
}

/// Sleep scores 80 and stress 30; no other factor is answered.
pub fn answers() -> Vec<Answer> {
    vec![
        answer("sleep_hours", 8.0, 10.0),
        answer("sleep_quality", 8.0, 10.0),
        answer("stress", 4.0, 10.0),
        answer("low_mood", 2.0, 10.0),
    ]
}

pub fn calm_intake() -> IntakeData {
    IntakeData {
        structured: json!({ "vitals": { "heart_rate": 72 } }),
        turns: vec![ConversationTurn {
            speaker: Speaker::Patient,
            text: "Mostly tired, otherwise fine.".to_string(),
        }],
    }
}

pub fn chest_pain_intake() -> IntakeData {
    IntakeData {
        structured: json!({ "vitals": { "heart_rate": 128 } }),
        turns: vec![ConversationTurn {
            speaker: Speaker::Patient,
            text: "I have had chest pain since this morning.".to_string(),
        }],
    }
}

pub fn chest_pain_rule(level: &str) -> Value {
    json!({
        "title": "Chest pain reported",
        "level": level,
        "condition": { "type": "keyword", "keywords": ["chest pain"], "speakers": ["patient"] }
    })
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub pipeline: Pipeline,
    pub job: ProcessingJob,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(PipelineSettings::default(), |_, stores| stores).await
    }

    /// Build a harness, letting `customize` replace individual stores.
    pub async fn with(
        settings: PipelineSettings,
        customize: impl FnOnce(&Arc<MemoryStore>, Stores) -> Stores,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let stores = customize(&store, Stores::from_backend(store.clone()));
        let pipeline = Pipeline::new(stores, settings);
        let assessment_id = Uuid::new_v4();
        store.seed_answers(assessment_id, answers());
        store.seed_intake(assessment_id, calm_intake());
        let job = pipeline
            .create_job(assessment_id, Uuid::new_v4())
            .await
            .unwrap();
        Self {
            store,
            pipeline,
            job,
        }
    }

    pub async fn current(&self) -> ProcessingJob {
        self.pipeline.job(self.job.id).await.unwrap()
    }

    /// Run every stage before `stage`, asserting each succeeds.
    pub async fn run_until(&self, stage: Stage) {
        for earlier in Stage::ALL.into_iter().take(stage.ordinal()) {
            let args = StageArgs {
                recipients: vec![Uuid::new_v4()],
                ..StageArgs::default()
            };
            self.pipeline
                .process(earlier, self.job.id, args)
                .await
                .unwrap_or_else(|f| panic!("{earlier} failed: {f}"));
        }
    }

    pub async fn activate_safety_rule(&self, key: &str, logic: Value, action: &str) -> RuleVersion {
        let draft = self
            .pipeline
            .registry()
            .create_draft(
                RuleKind::SafetyRule,
                key,
                logic,
                json!({ "action_default": action }),
                "clinical-ops",
                None,
            )
            .await
            .unwrap();
        self.pipeline
            .activate_rule_version(draft.id, Some("test".to_string()), "clinical-ops")
            .await
            .unwrap()
            .activated
    }
}

/// Delegates to a [`MemoryStore`] but fails writes of one artifact kind while armed.
pub struct FailingArtifacts {
    pub inner: Arc<MemoryStore>,
    pub kind: ArtifactKind,
    pub armed: AtomicBool,
}

impl FailingArtifacts {
    pub fn new(inner: Arc<MemoryStore>, kind: ArtifactKind) -> Arc<Self> {
        Arc::new(Self {
            inner,
            kind,
            armed: AtomicBool::new(false),
        })
    }

    pub fn arm(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }
}

impl ArtifactStore for FailingArtifacts {
    fn get_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
    ) -> BoxFuture<'_, Result<Option<Value>, StoreError>> {
        self.inner.get_artifact(job_id, kind)
    }

    fn put_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        data: Value,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        if kind == self.kind && self.armed.load(Ordering::SeqCst) {
            return Box::pin(std::future::ready(Err(StoreError::Backend(
                "injected write failure".to_string(),
            ))));
        }
        self.inner.put_artifact(job_id, kind, data)
    }
}
