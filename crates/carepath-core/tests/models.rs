use carepath_core::models::job::{JobPatch, JobStatus, ProcessingJob, Stage};
use carepath_core::models::rule::RuleStatus;
use uuid::Uuid;

#[test]
fn stages_advance_in_pipeline_order() {
    let mut stage = Stage::Risk;
    let mut seen = vec![stage];
    while let Some(next) = stage.next() {
        seen.push(next);
        stage = next;
    }
    assert_eq!(seen, Stage::ALL.to_vec());
    assert_eq!(Stage::Pdf.next(), None);
}

#[test]
fn stage_parses_from_its_name() {
    for stage in Stage::ALL {
        assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
    }
    assert!("scheduling".parse::<Stage>().is_err());
}

#[test]
fn rule_status_only_moves_forward() {
    assert_eq!(RuleStatus::Draft.transition(RuleStatus::Active).unwrap(), RuleStatus::Active);
    assert_eq!(
        RuleStatus::Active.transition(RuleStatus::Archived).unwrap(),
        RuleStatus::Archived
    );
    assert!(RuleStatus::Archived.transition(RuleStatus::Active).is_err());
    assert!(RuleStatus::Active.transition(RuleStatus::Draft).is_err());
    assert!(RuleStatus::Draft.transition(RuleStatus::Archived).is_err());
    assert!(RuleStatus::Active.transition(RuleStatus::Active).is_err());
}

#[test]
fn patch_never_pushes_attempt_past_max() {
    let mut job = ProcessingJob::new(Uuid::new_v4(), Uuid::new_v4(), 3);
    JobPatch {
        attempt: Some(7),
        status: Some(JobStatus::Running),
        ..Default::default()
    }
    .apply(&mut job);

    assert_eq!(job.attempt, 3);
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.stage, Stage::Risk);
}
