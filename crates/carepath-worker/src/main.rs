use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use carepath_core::models::intake::IntakeData;
use carepath_core::models::job::Stage;
use carepath_core::models::rule::RuleKind;
use carepath_core::models::safety::SafetyCheck;
use carepath_pipeline::{Pipeline, StageArgs, StageEnvelope, StageFailure, Stores};
use carepath_rules::RuleSelection;
use carepath_storage::s3::S3Store;
use carepath_worker::config;

#[derive(Debug, Parser)]
#[command(name = "carepath-worker", about = "Run CarePath assessment stages and rule operations")]
struct Cli {
    /// JSON config file. Missing file means built-in defaults.
    #[arg(long, env = "CAREPATH_CONFIG", default_value = "carepath.json")]
    config: PathBuf,

    #[arg(long, env = "CAREPATH_BUCKET")]
    bucket: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the effective config (file plus overrides) back to `--config`.
    InitConfig,
    /// Start a processing job for a completed assessment.
    CreateJob {
        #[arg(long)]
        assessment_id: Uuid,
        #[arg(long)]
        correlation_id: Option<Uuid>,
    },
    /// Run one stage of a job.
    Run {
        #[arg(long)]
        stage: Stage,
        #[arg(long)]
        job_id: Uuid,
        #[arg(long)]
        risk_bundle_id: Option<Uuid>,
        #[arg(long)]
        top_n: Option<u32>,
        /// Rule version to evaluate in place of its key's active version.
        #[arg(long = "pin")]
        pinned_rules: Vec<Uuid>,
        #[arg(long = "recipient")]
        recipients: Vec<Uuid>,
    },
    /// Persist a safety check returned in an earlier SAVE_FAILED envelope.
    RetrySafetySave {
        #[arg(long)]
        job_id: Uuid,
        /// JSON file holding the check.
        #[arg(long)]
        check: PathBuf,
    },
    /// Create a draft rule version.
    DraftRule {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        key: String,
        #[arg(long)]
        logic: PathBuf,
        #[arg(long)]
        defaults: Option<PathBuf>,
        #[arg(long)]
        created_by: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Activate a draft, archiving the key's current active version.
    ActivateRule {
        #[arg(long)]
        version_id: Uuid,
        #[arg(long)]
        changed_by: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List a key's versions after verifying at most one is active.
    RuleVersions {
        #[arg(long)]
        key: String,
    },
    /// Evaluate an intake file against the rules without touching any job.
    Sandbox {
        #[arg(long)]
        intake: PathBuf,
        #[arg(long = "pin")]
        pinned_rules: Vec<Uuid>,
    },
    /// Report whether a diagnosis run with these inputs was submitted recently.
    CheckRun {
        #[arg(long)]
        patient_id: Uuid,
        #[arg(long)]
        inputs: PathBuf,
    },
    /// Submit a diagnosis run unless an identical one is inside the dedup window.
    SubmitRun {
        #[arg(long)]
        patient_id: Uuid,
        #[arg(long)]
        inputs: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Safety,
    Scoring,
}

impl From<KindArg> for RuleKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Safety => RuleKind::SafetyRule,
            KindArg::Scoring => RuleKind::ScoringConfig,
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    // JSON logs on stderr; stdout carries only the result envelope.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config =
        config::load_or_default(&cli.config)?.with_overrides(cli.bucket, cli.region);

    if let Command::InitConfig = cli.command {
        config::save(&cli.config, &config)?;
        return Ok(ExitCode::SUCCESS);
    }

    let client = carepath_storage::client::build_client(config.region.as_deref()).await;
    let store = Arc::new(S3Store::new(client, config.bucket.clone()));
    tracing::info!(bucket = %config.bucket, "worker starting");

    let pipeline = Pipeline::new(Stores::from_backend(store), config.into());
    let envelope = dispatch(&pipeline, cli.command).await?;

    println!("{}", serde_json::to_string(&envelope)?);
    Ok(if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn dispatch(pipeline: &Pipeline, command: Command) -> eyre::Result<StageEnvelope> {
    let envelope = match command {
        Command::InitConfig => return Err(eyre::eyre!("init-config is handled before dispatch")),
        Command::CreateJob {
            assessment_id,
            correlation_id,
        } => {
            let correlation_id = correlation_id.unwrap_or_else(Uuid::new_v4);
            StageEnvelope::from_result(
                pipeline
                    .create_job(assessment_id, correlation_id)
                    .await
                    .map_err(StageFailure::from),
            )
        }
        Command::Run {
            stage,
            job_id,
            risk_bundle_id,
            top_n,
            pinned_rules,
            recipients,
        } => {
            let args = StageArgs {
                risk_bundle_id,
                top_n,
                pinned_rules,
                recipients,
            };
            StageEnvelope::from_result(pipeline.process(stage, job_id, args).await)
        }
        Command::RetrySafetySave { job_id, check } => {
            let check: SafetyCheck = read_json(&check)?;
            StageEnvelope::from_result(pipeline.retry_safety_save(job_id, check).await)
        }
        Command::DraftRule {
            kind,
            key,
            logic,
            defaults,
            created_by,
            reason,
        } => {
            let logic = read_json(&logic)?;
            let defaults = match defaults {
                Some(path) => read_json(&path)?,
                None => serde_json::json!({}),
            };
            StageEnvelope::from_result(
                pipeline
                    .registry()
                    .create_draft(kind.into(), &key, logic, defaults, &created_by, reason)
                    .await
                    .map_err(StageFailure::from),
            )
        }
        Command::ActivateRule {
            version_id,
            changed_by,
            reason,
        } => StageEnvelope::from_result(
            pipeline
                .activate_rule_version(version_id, reason, &changed_by)
                .await,
        ),
        Command::RuleVersions { key } => {
            let registry = pipeline.registry();
            let result = match registry.check_consistency(&key).await {
                Ok(()) => registry.list_versions(&key).await,
                Err(e) => Err(e),
            };
            StageEnvelope::from_result(result.map_err(StageFailure::from))
        }
        Command::Sandbox {
            intake,
            pinned_rules,
        } => {
            let intake: IntakeData = read_json(&intake)?;
            let selection = pinned_rules
                .into_iter()
                .fold(RuleSelection::active(), RuleSelection::pin);
            StageEnvelope::from_result(pipeline.evaluate_safety_sandbox(&intake, &selection).await)
        }
        Command::CheckRun { patient_id, inputs } => {
            let inputs = read_json(&inputs)?;
            StageEnvelope::from_result(
                pipeline
                    .check_duplicate_run(patient_id, &inputs)
                    .await
                    .map_err(StageFailure::from),
            )
        }
        Command::SubmitRun { patient_id, inputs } => {
            let inputs = read_json(&inputs)?;
            StageEnvelope::from_result(
                pipeline
                    .submit_diagnosis_run(patient_id, &inputs)
                    .await
                    .map_err(StageFailure::from),
            )
        }
    };
    Ok(envelope)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> eyre::Result<T> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}
