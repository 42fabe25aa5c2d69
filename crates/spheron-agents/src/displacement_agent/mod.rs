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

//! Acts as the agent for the displacement subsystem.
//!
//! It owns the device buffer set across steps and selects the displacement
//! strategy. Each step and each shutdown builds a fresh
//! [`LaneContext`](spheron_core::lane::LaneContext) lending the lane the
//! store, the grid and the buffers.

mod agent;

pub use agent::*;
