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

//! Context key types for [`LaneContext`](super::LaneContext).
//!
//! These newtypes are inserted into a `LaneContext` by agents and extracted
//! by lanes.
//!
//! | Key                    | Meaning                                      |
//! |------------------------|----------------------------------------------|
//! | [`StepParams`]         | Simulation parameters for the current step   |
//! | [`StepTuning`]         | Chunk size and buffer growth factor          |

use crate::config::{DisplacementConfig, SimulationParams};

/// Simulation parameters for the current step.
#[derive(Debug, Clone, Copy)]
pub struct StepParams(pub SimulationParams);

/// Pipeline tuning for the current step.
#[derive(Debug, Clone, Copy)]
pub struct StepTuning(pub DisplacementConfig);
