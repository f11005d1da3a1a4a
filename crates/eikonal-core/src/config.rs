//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `eikonal-config.yaml` at the project
//! root. Every section is optional; missing fields take the defaults below.
//! `region` has no defaults and is only needed by `init`, since later
//! commands read the region back from the store.

use std::path::{Path, PathBuf};

use eikonal_field::{QualityParams, RegionBounds, RegionError, StudyRegion};
use eikonal_types::{FieldType, Period, PeriodError, RunId};
use serde::Deserialize;

use crate::pipeline::RunSettings;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The `region` section is required but absent.
    #[error("config has no `region` section")]
    MissingRegion,

    /// A configured period is not a positive finite number.
    #[error("invalid period in config: {0}")]
    Period(#[from] PeriodError),

    /// The configured region is inconsistent.
    #[error(transparent)]
    Region(#[from] RegionError),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Where [`EikonalConfig::load_or_default`] found its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the given file.
    File,
    /// The file was absent; built-in defaults were used.
    Defaults,
}

/// Top-level configuration.
///
/// Mirrors the structure of `eikonal-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EikonalConfig {
    /// Study region written by `init`.
    #[serde(default)]
    pub region: Option<RegionConfig>,

    /// Per-run selectors and id allocation.
    #[serde(default)]
    pub run: RunConfig,

    /// Curvature and gradient thresholds of the reference builder.
    #[serde(default)]
    pub quality: QualityParams,

    /// Archive and store file locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EikonalConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for file locations:
    /// - `EIKONAL_ARCHIVE` overrides `paths.archive`
    /// - `EIKONAL_STORE` overrides `paths.store`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.paths.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.paths.apply_env_overrides();
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    ///
    /// The returned [`ConfigSource`] tells the caller which happened, so it
    /// can be reported once logging is up.
    ///
    /// # Errors
    ///
    /// As [`EikonalConfig::from_file`] for an existing file.
    pub fn load_or_default(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        if path.exists() {
            return Ok((Self::from_file(path)?, ConfigSource::File));
        }
        let mut config = Self::default();
        config.paths.apply_env_overrides();
        Ok((config, ConfigSource::Defaults))
    }

    /// Validated study region from the `region` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRegion`], [`ConfigError::Period`] or
    /// [`ConfigError::Region`].
    pub fn study_region(&self) -> Result<StudyRegion, ConfigError> {
        let region = self.region.as_ref().ok_or(ConfigError::MissingRegion)?;
        let periods = region
            .periods
            .iter()
            .map(|&p| Period::from_f64(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StudyRegion::new(region.bounds, periods)?)
    }

    /// Settings for one [`run_eikonal`](crate::pipeline::run_eikonal) call.
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            field_type: self.run.field_type,
            channel: self.run.channel.clone(),
            data_type: self.run.data_type.clone(),
            start_run_id: RunId(self.run.start_run_id),
            max_run_attempts: self.run.max_run_attempts,
            quality: self.quality.clone(),
        }
    }
}

/// Study region section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionConfig {
    /// Bounds and spacing (`dlon`/`dlat` default to 0.2 degrees).
    #[serde(flatten)]
    pub bounds: RegionBounds,

    /// Periods in seconds; empty means the default list.
    #[serde(default)]
    pub periods: Vec<f64>,
}

/// Run section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Phase or group travel times.
    #[serde(default = "default_field_type")]
    pub field_type: FieldType,

    /// Channel pair of the archive key.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Auxiliary data type of the archive key.
    #[serde(default = "default_data_type")]
    pub data_type: String,

    /// First run id tried.
    #[serde(default)]
    pub start_run_id: u32,

    /// How many consecutive run ids are tried before giving up.
    #[serde(default = "default_max_run_attempts")]
    pub max_run_attempts: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            field_type: default_field_type(),
            channel: default_channel(),
            data_type: default_data_type(),
            start_run_id: 0,
            max_run_attempts: default_max_run_attempts(),
        }
    }
}

const fn default_field_type() -> FieldType {
    FieldType::Phase
}

fn default_channel() -> String {
    "ZZ".to_owned()
}

fn default_data_type() -> String {
    "FieldDISPpmf2interp".to_owned()
}

const fn default_max_run_attempts() -> u32 {
    1000
}

/// File locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathsConfig {
    /// JSON travel-time archive.
    #[serde(default = "default_archive_path")]
    pub archive: PathBuf,

    /// JSON tomography store.
    #[serde(default = "default_store_path")]
    pub store: PathBuf,
}

impl PathsConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("EIKONAL_ARCHIVE") {
            self.archive = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("EIKONAL_STORE") {
            self.store = PathBuf::from(val);
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            archive: default_archive_path(),
            store: default_store_path(),
        }
    }
}

fn default_archive_path() -> PathBuf {
    PathBuf::from("travel-times.json")
}

fn default_store_path() -> PathBuf {
    PathBuf::from("eikonal-store.json")
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use eikonal_field::GradientMode;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EikonalConfig::default();
        assert!(config.region.is_none());
        assert_eq!(config.run.field_type, FieldType::Phase);
        assert_eq!(config.run.channel, "ZZ");
        assert_eq!(config.run.data_type, "FieldDISPpmf2interp");
        assert_eq!(config.run.max_run_attempts, 1000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.quality.gradient_mode(), GradientMode::NearestNeighbor);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
region:
  minlon: 230
  maxlon: 235
  minlat: 35
  maxlat: 40
  periods: [10, 24.5]

run:
  field_type: group
  channel: ZZ
  data_type: FieldDISPpmf2interp
  start_run_id: 3
  max_run_attempts: 10

quality:
  gradient_mode: distance_cutoff
  cutoff_distance_km: 150.0
  curvature_threshold: 0.01
  min_velocity: 2.0

logging:
  level: debug
  json: true
";
        let config = EikonalConfig::parse(yaml).unwrap();
        let region = config.study_region().unwrap();
        assert_eq!(region.nlon(), 26);
        assert_eq!(region.nlat(), 26);
        assert_eq!(region.periods().len(), 2);
        assert_eq!(region.periods().get(1).map(|p| p.group_name()).unwrap(), "24.5_sec");

        let settings = config.run_settings();
        assert_eq!(settings.field_type, FieldType::Group);
        assert_eq!(settings.start_run_id, RunId(3));
        assert_eq!(settings.max_run_attempts, 10);
        assert_eq!(
            settings.quality.gradient_mode(),
            GradientMode::DistanceCutoff { km: Some(150.0) }
        );
        assert_eq!(settings.quality.curvature_threshold, 0.01);
        // Unlisted thresholds keep their defaults.
        assert_eq!(settings.quality.max_velocity, 6.0);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "run:\n  start_run_id: 7\n";
        let config = EikonalConfig::parse(yaml).unwrap();
        assert_eq!(config.run.start_run_id, 7);
        assert_eq!(config.run.channel, "ZZ");
        assert!(matches!(
            config.study_region(),
            Err(ConfigError::MissingRegion)
        ));
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(EikonalConfig::parse("").is_ok());
    }

    #[test]
    fn region_without_periods_uses_default_list() {
        let yaml = "region: {minlon: 230, maxlon: 235, minlat: 35, maxlat: 40}\n";
        let region = EikonalConfig::parse(yaml).unwrap().study_region().unwrap();
        assert_eq!(region.periods().len(), 22);
        assert_eq!(region.bounds().dlon, 0.2);
    }

    #[test]
    fn bad_region_is_rejected() {
        let yaml = "region: {minlon: 235, maxlon: 230, minlat: 35, maxlat: 40}\n";
        let config = EikonalConfig::parse(yaml).unwrap();
        assert!(matches!(config.study_region(), Err(ConfigError::Region(_))));

        let yaml = "region: {minlon: 230, maxlon: 235, minlat: 35, maxlat: 40, periods: [-1]}\n";
        let config = EikonalConfig::parse(yaml).unwrap();
        assert!(matches!(config.study_region(), Err(ConfigError::Period(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = EikonalConfig::load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert!(config.region.is_none());

        let file = dir.path().join("eikonal-config.yaml");
        std::fs::write(&file, "logging:\n  level: debug\n").unwrap();
        let (config, source) = EikonalConfig::load_or_default(&file).unwrap();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("eikonal-config.yaml");
        if path.exists() {
            let config = EikonalConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
