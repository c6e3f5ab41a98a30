//! Pipeline configuration.
//!
//! Configuration is read from JSON. Every section and key is optional:
//!
//! ```json
//! {
//!   "exposure": { "orbits_per_batch": 128 },
//!   "occupancy": { "scale_to_khz": true },
//!   "boards": { "chamber": 0 }
//! }
//! ```

use midqc_core::ConfigError;
use midqc_geometry::N_CHAMBERS;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Orbits credited to every exposure bin per batch by default.
pub const DEFAULT_ORBITS_PER_BATCH: f64 = 128.0;

/// Errors raised while loading a [`PipelineConfig`].
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is not valid JSON for this schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Settings for an [`AggregationPipeline`](crate::AggregationPipeline).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Exposure added to every (DE, column) bin of both orbit maps per batch.
    pub orbits_per_batch: f64,
    /// Publish occupancy as a rate in kHz instead of hits per orbit.
    pub scale_to_khz: bool,
    /// Chamber whose local boards are filled in the local board map.
    pub board_chamber: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            orbits_per_batch: DEFAULT_ORBITS_PER_BATCH,
            scale_to_khz: true,
            board_chamber: 0,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonConfig {
    exposure: JsonExposure,
    occupancy: JsonOccupancy,
    boards: JsonBoards,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonExposure {
    orbits_per_batch: f64,
}

impl Default for JsonExposure {
    fn default() -> Self {
        Self {
            orbits_per_batch: DEFAULT_ORBITS_PER_BATCH,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonOccupancy {
    scale_to_khz: bool,
}

impl Default for JsonOccupancy {
    fn default() -> Self {
        Self { scale_to_khz: true }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonBoards {
    chamber: u8,
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds out-of-range values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        Ok(Self::from_json_config(json_config)?)
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid JSON or holds
    /// out-of-range values.
    pub fn from_json(json: &str) -> Result<Self, ConfigLoadError> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        Ok(Self::from_json_config(json_config)?)
    }

    fn from_json_config(config: JsonConfig) -> Result<Self, ConfigError> {
        let parsed = Self {
            orbits_per_batch: config.exposure.orbits_per_batch,
            scale_to_khz: config.occupancy.scale_to_khz,
            board_chamber: config.boards.chamber,
        };
        parsed.validate()?;
        Ok(parsed)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidExposure`] unless the exposure is finite
    /// and positive, and [`ConfigError::InvalidBoardChamber`] for a chamber
    /// outside `[0, 4)`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.orbits_per_batch.is_finite() || self.orbits_per_batch <= 0.0 {
            return Err(ConfigError::InvalidExposure(self.orbits_per_batch));
        }
        if self.board_chamber >= N_CHAMBERS {
            return Err(ConfigError::InvalidBoardChamber(self.board_chamber));
        }
        Ok(())
    }

    /// Set the exposure increment.
    #[must_use]
    pub fn with_orbits_per_batch(mut self, orbits: f64) -> Self {
        self.orbits_per_batch = orbits;
        self
    }

    /// Select kHz or per-orbit occupancy.
    #[must_use]
    pub fn with_scale_to_khz(mut self, enabled: bool) -> Self {
        self.scale_to_khz = enabled;
        self
    }

    /// Select the chamber shown in the local board map.
    #[must_use]
    pub fn with_board_chamber(mut self, chamber: u8) -> Self {
        self.board_chamber = chamber;
        self
    }
}
