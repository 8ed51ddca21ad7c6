//! Experiment configuration loading.
//!
//! An experiment config is a JSON document naming the run and carrying the
//! request sent to the compute service. Loading happens before any remote
//! work starts; a failure here aborts the run with a permanent config error.

pub mod settings;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::client::events::ExperimentRequest;

pub use settings::Settings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Experiment config not found: {0}")]
    NotFound(String),

    #[error("Failed to read experiment config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid experiment config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid experiment config: {0}")]
    Invalid(String),
}

/// One experiment's configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Human-readable name, used for artifact naming
    #[serde(default)]
    pub name: String,
    /// Project-relative directory for results artifacts
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    /// Commit the results artifact after writing it
    #[serde(default = "default_auto_commit")]
    pub auto_commit: bool,
    /// The request sent to the compute service
    pub request: ExperimentRequest,
}

fn default_results_dir() -> String {
    "results".to_string()
}

fn default_auto_commit() -> bool {
    true
}

/// Source of experiment configurations; the orchestrator only sees this
/// trait, so tests can hand it canned configs.
pub trait ConfigLoader: Send + Sync {
    fn load(&self, reference: &str) -> Result<ExperimentConfig, ConfigError>;
}

/// Loads experiment configs from JSON files. A reference is either a path
/// to a `.json` file or a bare name resolved under the base directory.
pub struct FileConfigLoader {
    base_dir: PathBuf,
}

impl FileConfigLoader {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        let as_path = Path::new(reference);
        if as_path.is_absolute() || reference.ends_with(".json") {
            as_path.to_path_buf()
        } else {
            self.base_dir.join(format!("{reference}.json"))
        }
    }
}

impl ConfigLoader for FileConfigLoader {
    fn load(&self, reference: &str) -> Result<ExperimentConfig, ConfigError> {
        let path = self.resolve(reference);
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut config: ExperimentConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        validate(&config)?;

        if config.request.experiment_id.trim().is_empty() {
            config.request.experiment_id = generated_experiment_id(&config.name);
        }
        if config.name.trim().is_empty() {
            config.name = config.request.experiment_id.clone();
        }

        tracing::info!(
            name = %config.name,
            experiment_id = %config.request.experiment_id,
            "Loaded experiment config"
        );
        Ok(config)
    }
}

fn validate(config: &ExperimentConfig) -> Result<(), ConfigError> {
    if config.request.personas.count == 0 {
        return Err(ConfigError::Invalid(
            "persona count must be at least 1".to_string(),
        ));
    }
    if config.request.personas.archetypes.is_empty() {
        return Err(ConfigError::Invalid(
            "at least one archetype is required".to_string(),
        ));
    }
    if config.request.stimulus.template.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "stimulus template cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn generated_experiment_id(name: &str) -> String {
    let slug = crate::util::slugify(name);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("exp-{slug}-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VALID_CONFIG: &str = r#"{
        "name": "Seed Pricing Test",
        "results_dir": "experiments/results",
        "request": {
            "experiment_id": "exp-pricing-1",
            "personas": {
                "archetypes": [
                    {"id": "arch-1", "name": "Early Adopter", "count": 2, "description": "tries everything"}
                ],
                "count": 2
            },
            "stimulus": {"template": "Would you pay $49/month for this?"},
            "execution": {"model": "claude-sonnet-4-5-20250929", "temperature": 0.7, "maxTokens": 500}
        }
    }"#;

    fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "pricing.json", VALID_CONFIG);

        let loader = FileConfigLoader::new(dir.path().to_path_buf());
        let config = loader.load(path.to_str().unwrap()).unwrap();

        assert_eq!(config.name, "Seed Pricing Test");
        assert_eq!(config.results_dir, "experiments/results");
        assert!(config.auto_commit);
        assert_eq!(config.request.experiment_id, "exp-pricing-1");
        assert_eq!(config.request.personas.count, 2);
    }

    #[test]
    fn test_bare_reference_resolved_under_base_dir() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "pricing.json", VALID_CONFIG);

        let loader = FileConfigLoader::new(dir.path().to_path_buf());
        assert!(loader.load("pricing").is_ok());
    }

    #[test]
    fn test_missing_config_is_not_found() {
        let dir = TempDir::new().unwrap();
        let loader = FileConfigLoader::new(dir.path().to_path_buf());
        assert!(matches!(
            loader.load("absent"),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "bad.json", "{broken");

        let loader = FileConfigLoader::new(dir.path().to_path_buf());
        assert!(matches!(
            loader.load(path.to_str().unwrap()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_zero_personas_rejected() {
        let dir = TempDir::new().unwrap();
        let contents = VALID_CONFIG.replace(r#""count": 2"#, r#""count": 0"#);
        let path = write_config(&dir, "zero.json", &contents);

        let loader = FileConfigLoader::new(dir.path().to_path_buf());
        assert!(matches!(
            loader.load(path.to_str().unwrap()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_empty_experiment_id_generated() {
        let dir = TempDir::new().unwrap();
        let contents = VALID_CONFIG.replace(r#""experiment_id": "exp-pricing-1","#, "");
        let path = write_config(&dir, "noid.json", &contents);

        let loader = FileConfigLoader::new(dir.path().to_path_buf());
        let config = loader.load(path.to_str().unwrap()).unwrap();
        assert!(config.request.experiment_id.starts_with("exp-seed-pricing-test-"));
    }
}
