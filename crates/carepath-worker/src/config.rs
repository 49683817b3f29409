use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use carepath_pipeline::PipelineSettings;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
pub const CURRENT_VERSION: u32 = 2;

/// Keys that lived at the top level before v1 and now belong under `pipeline`.
const HOISTED_PIPELINE_KEYS: &[&str] = &["dedup_enabled", "dedup_window_hours", "max_attempts"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

fn default_bucket() -> String {
    "carepath".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            bucket: default_bucket(),
            region: None,
            pipeline: PipelineSettings::default(),
        }
    }
}

impl WorkerConfig {
    /// Apply command-line overrides on top of the file values.
    pub fn with_overrides(mut self, bucket: Option<String>, region: Option<String>) -> Self {
        if let Some(bucket) = bucket {
            self.bucket = bucket;
        }
        if region.is_some() {
            self.region = region;
        }
        self
    }
}

impl From<WorkerConfig> for PipelineSettings {
    fn from(config: WorkerConfig) -> Self {
        config.pipeline
    }
}

pub fn load(path: &Path) -> eyre::Result<WorkerConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read config at {}: {e}", path.display()))?;

    let json: Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: WorkerConfig = serde_json::from_value(migrated)?;
    Ok(config)
}

/// Like [`load`], but a missing file yields the defaults.
pub fn load_or_default(path: &Path) -> eyre::Result<WorkerConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(WorkerConfig::default());
    }
    load(path)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(mut json: Value, from_version: u32) -> eyre::Result<Value> {
    if from_version > CURRENT_VERSION {
        return Err(eyre::eyre!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION})"
        ));
    }

    let obj = json
        .as_object_mut()
        .ok_or_else(|| eyre::eyre!("config is not a JSON object"))?;

    // v0 → v1: pipeline knobs move from the top level into `pipeline`
    if from_version < 1 {
        let mut pipeline = match obj.remove("pipeline") {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        for key in HOISTED_PIPELINE_KEYS {
            if let Some(value) = obj.remove(*key) {
                pipeline.entry(*key).or_insert(value);
            }
        }
        obj.insert("pipeline".to_string(), Value::Object(pipeline));
        obj.insert("config_version".to_string(), Value::Number(1.into()));
        tracing::info!("migrated config v0 → v1 (moved pipeline settings)");
    }

    // v1 → v2: `timeout_secs` became `pipeline.io_timeout_secs`
    if from_version < 2 {
        if let Some(timeout) = obj.remove("timeout_secs")
            && let Some(Value::Object(pipeline)) = obj.get_mut("pipeline")
        {
            pipeline.entry("io_timeout_secs").or_insert(timeout);
        }
        obj.insert("config_version".to_string(), Value::Number(2.into()));
        tracing::info!("migrated config v1 → v2 (renamed timeout_secs)");
    }

    Ok(json)
}

pub fn save(path: &Path, config: &WorkerConfig) -> eyre::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }

    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;
    let json = serde_json::to_string_pretty(&stamped)?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
