//! Pipeline configuration
//!
//! Every path and business rule the pipeline relies on lives here, so a run is
//! fully described by one [`PipelineConfig`] value. Configurations serialize to
//! JSON; fields missing from a file fall back to their defaults.

use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the raw competition files
    pub raw_dir: PathBuf,
    pub train_users_file: String,
    pub test_users_file: String,
    pub sessions_file: String,
    /// Directory receiving all output tables
    pub output_dir: PathBuf,
    pub processed_train_file: String,
    pub processed_test_file: String,
    pub encoded_train_file: String,
    pub encoded_test_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            train_users_file: "train_users.csv".to_string(),
            test_users_file: "test_users.csv".to_string(),
            sessions_file: "sessions.csv".to_string(),
            output_dir: PathBuf::from("data/processed"),
            processed_train_file: "processed_train_users.csv".to_string(),
            processed_test_file: "processed_test_users.csv".to_string(),
            encoded_train_file: "encoded_train_users.csv".to_string(),
            encoded_test_file: "encoded_test_users.csv".to_string(),
        }
    }
}

impl PathsConfig {
    pub fn train_users_path(&self) -> PathBuf {
        self.raw_dir.join(&self.train_users_file)
    }

    pub fn test_users_path(&self) -> PathBuf {
        self.raw_dir.join(&self.test_users_file)
    }

    pub fn sessions_path(&self) -> PathBuf {
        self.raw_dir.join(&self.sessions_file)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// Names of the columns the pipeline reads by role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    /// User identifier in the user tables
    pub id: String,
    /// User identifier in the session table
    pub session_user: String,
    /// Label column, present only in the train table
    pub target: String,
    /// Elapsed seconds in the session table
    pub elapsed: String,
    /// Account creation date (`%Y-%m-%d`)
    pub account_created: String,
    /// First activity timestamp (`%Y%m%d%H%M%S`)
    pub first_active_timestamp: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            session_user: "user_id".to_string(),
            target: "country_destination".to_string(),
            elapsed: "secs_elapsed".to_string(),
            account_created: "date_account_created".to_string(),
            first_active_timestamp: "timestamp_first_active".to_string(),
        }
    }
}

/// Data cleaning rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Placeholder the raw files use for a missing categorical value
    pub unknown_marker: String,
    /// User columns where the marker means missing
    pub unknown_user_columns: Vec<String>,
    /// Treat the marker as missing in every session string column
    pub unknown_in_sessions: bool,
    pub age_column: String,
    /// Ages below this become missing
    pub min_age: f64,
    /// Ages above this become missing
    pub max_age: f64,
    /// Columns removed right after loading
    pub drop_columns: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            unknown_marker: "-unknown-".to_string(),
            unknown_user_columns: vec!["gender".to_string(), "language".to_string()],
            unknown_in_sessions: true,
            age_column: "age".to_string(),
            min_age: 14.0,
            max_age: 100.0,
            drop_columns: vec!["date_first_booking".to_string()],
        }
    }
}

/// Feature schema of the per-user session summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Session columns tallied per observed value
    pub tally_columns: Vec<String>,
    /// Session column whose most frequent value is reported
    pub device_column: String,
    /// Output column holding that most frequent value
    pub most_used_column: String,
    /// Output column holding the number of events
    pub session_length_column: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            tally_columns: vec![
                "action".to_string(),
                "action_type".to_string(),
                "action_detail".to_string(),
                "device_type".to_string(),
            ],
            device_column: "device_type".to_string(),
            most_used_column: "most_used_device".to_string(),
            session_length_column: "session_length".to_string(),
        }
    }
}

/// Final encoding stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Columns removed before one-hot encoding
    pub drop_columns: Vec<String>,
    /// Columns expanded into one indicator column per value
    pub categorical_features: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            drop_columns: vec![
                "date_account_created".to_string(),
                "date_first_active".to_string(),
                "timestamp_first_active".to_string(),
            ],
            categorical_features: [
                "gender",
                "signup_method",
                "signup_flow",
                "language",
                "affiliate_channel",
                "affiliate_provider",
                "first_affiliate_tracked",
                "signup_app",
                "first_device_type",
                "first_browser",
                "most_used_device",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Configuration for the per-user worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Number of threads (None = use all available)
    pub n_threads: Option<usize>,
    /// Users handed to a worker at a time
    pub chunk_size: usize,
    /// A single user's aggregation taking longer than this fails the run
    pub task_timeout_ms: u64,
    /// Extra attempts for a user whose aggregation panicked
    pub max_retries: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            n_threads: None,
            chunk_size: 256,
            task_timeout_ms: 30_000,
            max_retries: 1,
        }
    }
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of threads
    pub fn with_threads(mut self, n: usize) -> Self {
        self.n_threads = Some(n);
        self
    }

    /// Set chunk size
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the per-task timeout
    pub fn with_task_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.task_timeout_ms = timeout_ms;
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
    }
}

/// CSV reading options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Rows scanned to infer column types (None = whole file)
    pub infer_schema_length: Option<usize>,
    /// Field separator of the source tables, a single ASCII character
    pub delimiter: char,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            infer_schema_length: Some(10_000),
            delimiter: ',',
        }
    }
}

/// Complete description of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub columns: ColumnsConfig,
    pub cleaning: CleaningConfig,
    pub aggregation: AggregationConfig,
    pub encoding: EncodingConfig,
    pub parallel: ParallelConfig,
    pub csv: CsvConfig,
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PrepError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builder method to set the raw input directory
    pub fn with_raw_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.raw_dir = dir.into();
        self
    }

    /// Builder method to set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.output_dir = dir.into();
        self
    }

    /// Builder method to set the worker configuration
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Builder method to replace the session feature schema
    pub fn with_aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.cleaning.min_age > self.cleaning.max_age {
            return Err(PrepError::ConfigError(format!(
                "min_age {} is greater than max_age {}",
                self.cleaning.min_age, self.cleaning.max_age
            )));
        }
        if self.parallel.chunk_size == 0 {
            return Err(PrepError::ConfigError("chunk_size must be at least 1".to_string()));
        }
        if self.parallel.task_timeout_ms == 0 {
            return Err(PrepError::ConfigError("task_timeout_ms must be at least 1".to_string()));
        }
        if self.columns.id.is_empty() || self.columns.session_user.is_empty() {
            return Err(PrepError::ConfigError("identifier column names must not be empty".to_string()));
        }
        if !self.csv.delimiter.is_ascii() {
            return Err(PrepError::ConfigError(format!(
                "delimiter '{}' is not a single-byte character",
                self.csv.delimiter
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.cleaning.min_age, 14.0);
        assert_eq!(config.cleaning.max_age, 100.0);
        assert_eq!(config.parallel.max_retries, 1);
        assert!(config.encoding.categorical_features.contains(&"most_used_device".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new()
            .with_raw_dir("/tmp/raw")
            .with_output_dir("/tmp/out")
            .with_parallel(ParallelConfig::new().with_threads(4).with_chunk_size(16));

        assert_eq!(config.paths.sessions_path(), PathBuf::from("/tmp/raw/sessions.csv"));
        assert_eq!(
            config.paths.output_path("x.csv"),
            PathBuf::from("/tmp/out/x.csv")
        );
        assert_eq!(config.parallel.num_threads(), 4);
        assert_eq!(config.parallel.chunk_size, 16);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let json = r#"{ "parallel": { "n_threads": 2 }, "cleaning": { "max_age": 90 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.parallel.n_threads, Some(2));
        assert_eq!(config.parallel.chunk_size, 256);
        assert_eq!(config.cleaning.max_age, 90.0);
        assert_eq!(config.cleaning.min_age, 14.0);
        assert_eq!(config.columns.id, "id");
    }

    #[test]
    fn test_json_roundtrip_through_file() {
        let config = PipelineConfig::new().with_output_dir("out");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, config.to_json().unwrap().as_bytes()).unwrap();

        let loaded = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_rejects_inverted_age_range() {
        let mut config = PipelineConfig::default();
        config.cleaning.min_age = 120.0;
        assert!(matches!(config.validate(), Err(PrepError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_multibyte_delimiter() {
        let mut config = PipelineConfig::default();
        config.csv.delimiter = '§';
        assert!(matches!(config.validate(), Err(PrepError::ConfigError(_))));

        config.csv.delimiter = ';';
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_threads_means_all_cores() {
        let config = ParallelConfig::new().with_threads(0);
        assert!(config.num_threads() >= 1);
    }
}
