// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Simulation parameters and tuning knobs for the displacement step.
//!
//! Both sections can be loaded from a single TOML file:
//!
//! ```toml
//! [simulation]
//! time_step = 0.01
//! bound_space = true
//! min_bound = 0.0
//! max_bound = 100.0
//!
//! [displacement]
//! growth_factor = 1.25
//! chunk_size = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Parameters owned by the simulation and read by the displacement step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Simulation time step.
    pub time_step: f32,
    /// Upper bound on the length of one displacement.
    pub max_displacement: f32,
    /// Whether agents are clamped into `[min_bound, max_bound]` after moving.
    pub bound_space: bool,
    /// Lower bound of the simulation space on every axis.
    pub min_bound: f32,
    /// Upper bound of the simulation space on every axis.
    pub max_bound: f32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            max_displacement: 3.0,
            bound_space: false,
            min_bound: 0.0,
            max_bound: 100.0,
        }
    }
}

impl SimulationParams {
    /// Rejects non-positive step sizes and inverted bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_step > 0.0) {
            return Err(ConfigError::Invalid {
                field: "time_step",
                reason: format!("must be positive, got {}", self.time_step),
            });
        }
        if !(self.max_displacement > 0.0) {
            return Err(ConfigError::Invalid {
                field: "max_displacement",
                reason: format!("must be positive, got {}", self.max_displacement),
            });
        }
        if self.min_bound > self.max_bound {
            return Err(ConfigError::Invalid {
                field: "min_bound",
                reason: format!(
                    "{} is greater than max_bound {}",
                    self.min_bound, self.max_bound
                ),
            });
        }
        Ok(())
    }
}

/// Tuning knobs of the displacement pipeline itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplacementConfig {
    /// Headroom factor applied whenever device buffers are (re)allocated.
    pub growth_factor: f64,
    /// Number of agents per dynamically scheduled work chunk.
    pub chunk_size: usize,
}

impl Default for DisplacementConfig {
    fn default() -> Self {
        Self {
            growth_factor: 1.25,
            chunk_size: 1000,
        }
    }
}

impl DisplacementConfig {
    /// Rejects growth factors below one and empty chunks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.growth_factor >= 1.0) || !self.growth_factor.is_finite() {
            return Err(ConfigError::Invalid {
                field: "growth_factor",
                reason: format!("must be a finite value >= 1.0, got {}", self.growth_factor),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpheronConfig {
    /// Simulation parameters.
    pub simulation: SimulationParams,
    /// Displacement pipeline tuning.
    pub displacement: DisplacementConfig,
}

impl SpheronConfig {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SpheronConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file, falling back to the defaults when the file
    /// does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!(
                "No configuration at '{}', using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validates both sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.displacement.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SpheronConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.displacement.growth_factor, 1.25);
        assert_eq!(config.displacement.chunk_size, 1000);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = SpheronConfig::from_toml_str(
            r#"
            [simulation]
            bound_space = true
            max_bound = 1.0

            [displacement]
            growth_factor = 2.0
            "#,
        )
        .unwrap();
        assert!(config.simulation.bound_space);
        assert_eq!(config.simulation.max_bound, 1.0);
        assert_eq!(config.simulation.time_step, 0.01);
        assert_eq!(config.displacement.growth_factor, 2.0);
        assert_eq!(config.displacement.chunk_size, 1000);
    }

    #[test]
    fn test_rejects_shrinking_growth_factor() {
        let err = SpheronConfig::from_toml_str("[displacement]\ngrowth_factor = 0.5\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "growth_factor",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let params = SimulationParams {
            min_bound: 2.0,
            max_bound: 1.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SpheronConfig::load(dir.path().join("Spheron.toml")).unwrap();
        assert_eq!(config, SpheronConfig::default());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Spheron.toml");
        std::fs::write(&path, "[displacement]\nchunk_size = 64\n").unwrap();
        let config = SpheronConfig::load(&path).unwrap();
        assert_eq!(config.displacement.chunk_size, 64);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let err = SpheronConfig::from_toml_str("[simulation\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
