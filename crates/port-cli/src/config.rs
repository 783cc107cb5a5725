//! Run configuration loading and validation.

use anyhow::{Context, Result};
use lib_dataset::writer::{DEFAULT_FILE_PREFIX, DEFAULT_OUTPUT_DIR};
use lib_port_ffi::loader::DEFAULT_MODEL;
use lib_port_ffi::LibraryFormat;
use lib_types::{Dimensions, TableShape, DATA_ROWS, OBSERVATION_DIMENSION, STATE_DIMENSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level run configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Run name, used in log lines.
    #[serde(default = "default_name")]
    pub name: String,

    /// Native estimator module.
    #[serde(default)]
    pub module: ModuleConfig,

    /// Observation input.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Estimation output.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "estimator-port".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            module: ModuleConfig::default(),
            dataset: DatasetConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Native estimator module configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Path to the compiled module.
    #[serde(default = "default_module_path")]
    pub path: PathBuf,

    /// Symbol prefix of the exported entry points.
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_module_path() -> PathBuf {
    LibraryFormat::native().default_module_path("Output")
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            path: default_module_path(),
            model: default_model(),
        }
    }
}

/// Observation table configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the observation table.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    /// Exact number of rows the table must have.
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Observation components per row (Nz), after the time column.
    #[serde(default = "default_observation_dim")]
    pub observation_dim: usize,

    /// State components per output row (Nx), after the time column.
    #[serde(default = "default_state_dim")]
    pub state_dim: usize,
}

fn default_input() -> PathBuf {
    ["ObservationData", "DoubleReflectorTrace", "Trace1000.txt"]
        .iter()
        .collect()
}
fn default_rows() -> usize { DATA_ROWS }
fn default_observation_dim() -> usize { OBSERVATION_DIMENSION }
fn default_state_dim() -> usize { STATE_DIMENSION }

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            rows: default_rows(),
            observation_dim: default_observation_dim(),
            state_dim: default_state_dim(),
        }
    }
}

impl DatasetConfig {
    /// Expected estimator dimensions.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.state_dim, self.observation_dim)
    }

    /// Required shape of the observation table.
    pub fn observation_shape(&self) -> TableShape {
        self.dimensions().observation_shape(self.rows)
    }
}

/// Output configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving result files; created if missing.
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,

    /// File name prefix, followed by `_<timestamp>.txt`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_prefix() -> String {
    DEFAULT_FILE_PREFIX.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            prefix: default_prefix(),
        }
    }
}

/// Command-line values that take precedence over the configuration file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub module: Option<PathBuf>,
    pub model: Option<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl HarnessConfig {
    /// Apply command-line overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(path) = overrides.module {
            self.module.path = path;
        }
        if let Some(model) = overrides.model {
            self.module.model = model;
        }
        if let Some(input) = overrides.input {
            self.dataset.input = input;
        }
        if let Some(output) = overrides.output {
            self.output.directory = output;
        }
        self
    }
}

/// Load configuration from a file.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: HarnessConfig = if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content)
            .with_context(|| "Failed to parse config as JSON")?
    } else {
        // Assume TOML
        toml::from_str(&content)
            .with_context(|| "Failed to parse config as TOML")?
    };

    validate_config(&config)?;

    Ok(config)
}

/// Validate configuration.
///
/// File existence is not checked here; the loader and reader report missing
/// files with their own error kinds, in run order.
pub fn validate_config(config: &HarnessConfig) -> Result<()> {
    if !is_c_identifier(&config.module.model) {
        anyhow::bail!(
            "Invalid model name '{}': must be a C identifier used as the symbol prefix",
            config.module.model
        );
    }

    let dataset = &config.dataset;
    if dataset.rows == 0 || dataset.observation_dim == 0 || dataset.state_dim == 0 {
        anyhow::bail!(
            "Dataset sizes must be positive (got rows={}, observation_dim={}, state_dim={})",
            dataset.rows,
            dataset.observation_dim,
            dataset.state_dim
        );
    }

    let prefix = &config.output.prefix;
    if prefix.is_empty() || prefix.contains(['/', '\\']) {
        anyhow::bail!("Invalid output prefix '{}': must be a non-empty file name", prefix);
    }

    Ok(())
}

fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.module.model, "StateSpaceModel1");
        assert_eq!(
            config.module.path.file_stem().and_then(|s| s.to_str()),
            Some("EstimatorPortN")
        );
        assert_eq!(config.dataset.observation_shape(), TableShape::OBSERVATIONS);
        assert_eq!(config.output.directory, PathBuf::from("EstimationResult"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "name = \"demo\"\n[module]\nmodel = \"StateSpaceModel_Demo\"\n[dataset]\nrows = 10"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.name, "demo");
        assert_eq!(config.module.model, "StateSpaceModel_Demo");
        assert_eq!(config.module.path, default_module_path());
        assert_eq!(config.dataset.rows, 10);
        assert_eq!(config.dataset.state_dim, 4);
        assert_eq!(config.output.prefix, "EstimationResult");
    }

    #[test]
    fn test_json_config() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"module": {{"path": "lib/EstimatorPortN.dll"}}, "output": {{"directory": "out"}}}}"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.module.path, PathBuf::from("lib/EstimatorPortN.dll"));
        assert_eq!(config.output.directory, PathBuf::from("out"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let config = HarnessConfig::default().with_overrides(Overrides {
            model: Some("Other".to_string()),
            input: Some(PathBuf::from("in.txt")),
            ..Default::default()
        });
        assert_eq!(config.module.model, "Other");
        assert_eq!(config.dataset.input, PathBuf::from("in.txt"));
        assert_eq!(config.module.path, default_module_path());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = HarnessConfig::default();
        config.module.model = "1Model".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = HarnessConfig::default();
        config.dataset.rows = 0;
        assert!(validate_config(&config).is_err());

        let mut config = HarnessConfig::default();
        config.output.prefix = "a/b".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_c_identifier() {
        assert!(is_c_identifier("StateSpaceModel1"));
        assert!(is_c_identifier("_private"));
        assert!(!is_c_identifier(""));
        assert!(!is_c_identifier("has space"));
        assert!(!is_c_identifier("dash-name"));
    }
}
