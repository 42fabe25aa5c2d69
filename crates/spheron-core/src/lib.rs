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

//! # Spheron Core
//!
//! Foundational crate containing the agent model, the contracts of the
//! external collaborators (resource manager, neighbor grid, accelerator
//! device), the kernel argument layout, and configuration types.

#![warn(missing_docs)]

pub mod agent;
pub mod config;
pub mod device;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod lane;
pub mod math;
pub mod storage;

pub use agent::{Agent, AgentCapabilities, AgentHandle, Cell, Shape};
pub use config::{DisplacementConfig, SimulationParams, SpheronConfig};
pub use device::{DeviceBackend, DeviceError};
pub use error::{ConfigError, DisplacementError};
pub use grid::{GridBox, GridGeometry, NeighborGrid};
pub use kernel::KernelArgs;
pub use math::Vec3;
pub use storage::AgentStorage;
