use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::analysis::INTENSITY_THRESHOLD;
use crate::data::model::DisplayMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Step parameters
// ---------------------------------------------------------------------------

/// Upper y-axis limit for one display mode: where it starts, how far one
/// key press moves it, and how low it may go.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub default: f64,
    pub step: f64,
    pub min: f64,
}

/// Detector integration time in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub default_us: u32,
    pub step_us: u32,
    pub min_us: u32,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            default_us: 4000,
            step_us: 1000,
            min_us: 3000,
        }
    }
}

// ---------------------------------------------------------------------------
// Viewer configuration
// ---------------------------------------------------------------------------

/// Viewer settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub intensity_range: AxisRange,
    pub transmittance_range: AxisRange,
    pub absorbance_range: AxisRange,
    pub integration: IntegrationConfig,
    /// Blank pixels at or below this count are left out of the ratio.
    pub intensity_threshold: f64,
    /// Where "save data" and "save figure" write.
    pub save_dir: PathBuf,
    pub refresh_interval_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            intensity_range: AxisRange {
                default: 4000.0,
                step: 500.0,
                min: 500.0,
            },
            transmittance_range: AxisRange {
                default: 1.1,
                step: 0.1,
                min: 0.1,
            },
            absorbance_range: AxisRange {
                default: 1.1,
                step: 0.1,
                min: 0.1,
            },
            integration: IntegrationConfig::default(),
            intensity_threshold: INTENSITY_THRESHOLD,
            save_dir: PathBuf::from("data"),
            refresh_interval_ms: 1,
        }
    }
}

impl ViewerConfig {
    /// Load from a JSON file, or the defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config: ViewerConfig =
                    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                        path: path.to_path_buf(),
                        source,
                    })?;
                log::info!("loaded config from {}", path.display());
                config
            }
            None => ViewerConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn y_range(&self, mode: DisplayMode) -> AxisRange {
        match mode {
            DisplayMode::Intensity => self.intensity_range,
            DisplayMode::Transmittance => self.transmittance_range,
            DisplayMode::Absorbance => self.absorbance_range,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for mode in DisplayMode::ALL {
            let r = self.y_range(mode);
            if !(r.step > 0.0 && r.min > 0.0 && r.default >= r.min) {
                return Err(ConfigError::Invalid(format!(
                    "{} range needs step > 0, min > 0 and default >= min (got {r:?})",
                    mode.file_stem()
                )));
            }
        }
        let i = &self.integration;
        if i.step_us == 0 || i.default_us < i.min_us {
            return Err(ConfigError::Invalid(format!(
                "integration needs step_us > 0 and default_us >= min_us (got {i:?})"
            )));
        }
        if self.intensity_threshold.is_nan() || self.intensity_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "intensity_threshold must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}
