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

//! Error types shared by the displacement pipeline.

use std::fmt;

use crate::agent::{AgentHandle, Shape};
use crate::device::DeviceError;

/// A fatal error raised while executing a displacement step.
///
/// None of these are recoverable inside the step: the step is abandoned and
/// the error is surfaced to the caller.
#[derive(Debug)]
pub enum DisplacementError {
    /// An agent that cannot be displaced by the accelerator was encountered
    /// during attribute extraction.
    ShapeViolation {
        /// The offending agent.
        handle: AgentHandle,
        /// Its shape.
        shape: Shape,
    },
    /// The device could not grow its buffers to the required capacity.
    Allocation(DeviceError),
    /// The neighbor grid reported inconsistent geometry or membership.
    GridAccess(String),
    /// The device failed while running the kernel.
    Kernel(DeviceError),
    /// The agent population does not fit in the kernel's 32-bit index space.
    IndexOverflow(usize),
}

impl fmt::Display for DisplacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplacementError::ShapeViolation { handle, shape } => write!(
                f,
                "Non-spherical agent {handle} ({shape}) detected; accelerated displacement only supports spheres"
            ),
            DisplacementError::Allocation(e) => write!(f, "Device allocation failed: {e}"),
            DisplacementError::GridAccess(msg) => write!(f, "Inconsistent neighbor grid: {msg}"),
            DisplacementError::Kernel(e) => write!(f, "Displacement kernel failed: {e}"),
            DisplacementError::IndexOverflow(count) => {
                write!(f, "{count} agents exceed the kernel's 32-bit index space")
            }
        }
    }
}

impl std::error::Error for DisplacementError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DisplacementError::Allocation(e) | DisplacementError::Kernel(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for DisplacementError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::AllocationFailed { .. } => DisplacementError::Allocation(err),
            other => DisplacementError::Kernel(other),
        }
    }
}

/// An error in user-supplied configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(std::io::Error),
    /// The configuration file is not valid TOML for the expected schema.
    Parse(toml::de::Error),
    /// A value is outside its allowed range.
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read configuration: {e}"),
            ConfigError::Parse(e) => write!(f, "Failed to parse configuration: {e}"),
            ConfigError::Invalid { field, reason } => {
                write!(f, "Invalid configuration value for `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_failures_map_to_allocation() {
        let err: DisplacementError = DeviceError::AllocationFailed {
            buffer: "objects",
            requested: 10,
        }
        .into();
        assert!(matches!(err, DisplacementError::Allocation(_)));

        let err: DisplacementError = DeviceError::NotAllocated.into();
        assert!(matches!(err, DisplacementError::Kernel(_)));
    }

    #[test]
    fn test_shape_violation_message_names_agent() {
        let err = DisplacementError::ShapeViolation {
            handle: AgentHandle::new(1, 4),
            shape: Shape::Cube,
        };
        let msg = err.to_string();
        assert!(msg.contains("(1, 4)"));
        assert!(msg.contains("Cube"));
    }
}
