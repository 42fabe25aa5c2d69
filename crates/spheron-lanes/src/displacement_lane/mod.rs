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

//! Displacement Lane
//!
//! Computes and commits the pairwise-interaction displacement of every
//! spherical agent in five strictly sequential phases:
//!
//! ```text
//! grid bridge → attribute extraction → ensure capacity → kernel → commit
//! ```
//!
//! Only the committer writes agent state, so an aborted step leaves every
//! position untouched.

mod committer;
mod device_buffers;
mod extractor;
mod grid_bridge;
mod offsets;

pub use committer::*;
pub use device_buffers::*;
pub use extractor::*;
pub use grid_bridge::*;
pub use offsets::*;

use std::time::{Duration, Instant};

use spheron_core::config::SimulationParams;
use spheron_core::error::DisplacementError;
use spheron_core::grid::NeighborGrid;
use spheron_core::kernel::KernelArgs;
use spheron_core::lane::context_keys::{StepParams, StepTuning};
use spheron_core::lane::{Lane, LaneContext, LaneError, Ref, Slot};
use spheron_core::math::Vec3;
use spheron_core::storage::AgentStorage;

/// Summary of one completed displacement step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepReport {
    /// Number of agents moved.
    pub agent_count: usize,
    /// Number of grid boxes, occupied or not.
    pub box_count: usize,
    /// Device capacities after the buffer manager phase.
    pub capacity: CapacityChange,
    /// Wall time of the whole step.
    pub elapsed: Duration,
}

/// The accelerated displacement strategy.
#[derive(Debug, Clone, Copy)]
pub struct DisplacementLane {
    chunk_size: usize,
}

impl Default for DisplacementLane {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl DisplacementLane {
    /// Creates the lane with the given parallel chunk size.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Agents per parallel task in the extraction and commit phases.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Runs one full displacement step.
    ///
    /// On error nothing has been committed: the error is logged and returned
    /// and the caller must not run another step on the same state.
    pub fn step(
        &self,
        storage: &mut dyn AgentStorage,
        grid: &dyn NeighborGrid,
        buffers: &mut DeviceBuffers,
        params: &SimulationParams,
    ) -> Result<StepReport, DisplacementError> {
        self.run_phases(storage, grid, buffers, params)
            .map_err(|err| {
                log::error!("Displacement step aborted: {err}");
                err
            })
    }

    fn run_phases(
        &self,
        storage: &mut dyn AgentStorage,
        grid: &dyn NeighborGrid,
        buffers: &mut DeviceBuffers,
        params: &SimulationParams,
    ) -> Result<StepReport, DisplacementError> {
        let started = Instant::now();

        let offsets = NumaOffsetTable::from_storage(storage)?;
        let agent_count = offsets.total();

        log::trace!("Reading grid for {agent_count} agents");
        let snapshot = GridBridge::read(grid, &offsets)?;
        let box_count = snapshot.box_count();

        log::trace!("Extracting attributes");
        let attributes = AttributeExtractor::new(self.chunk_size).extract(
            storage,
            grid,
            &offsets,
            box_count,
        )?;

        let capacity = buffers.ensure_capacity(agent_count, box_count)?;

        log::trace!("Launching kernel on {}", buffers.backend().name());
        let geometry = snapshot.geometry;
        let args = KernelArgs {
            positions: &attributes.positions,
            diameters: &attributes.diameters,
            tractor_forces: &attributes.tractor_forces,
            adherence: &attributes.adherence,
            box_ids: &attributes.box_ids,
            masses: &attributes.masses,
            time_step: params.time_step,
            max_displacement: params.max_displacement,
            squared_radius: snapshot.squared_radius,
            num_objects: agent_count as u32,
            box_starts: &snapshot.box_starts,
            box_lengths: &snapshot.box_lengths,
            successors: &attributes.successors,
            box_length: geometry.box_length,
            num_boxes_axis: geometry.num_boxes_axis,
            grid_dimensions: geometry.dimensions,
        };
        let mut displacements = vec![Vec3::ZERO; agent_count];
        buffers.launch(&args, &mut displacements)?;

        log::trace!("Committing positions");
        PositionCommitter::new(self.chunk_size).commit(
            storage,
            &offsets,
            &displacements,
            params,
        )?;

        Ok(StepReport {
            agent_count,
            box_count,
            capacity,
            elapsed: started.elapsed(),
        })
    }
}

impl Lane for DisplacementLane {
    fn strategy_name(&self) -> &'static str {
        "AcceleratedDisplacement"
    }

    /// Reads `Slot<dyn AgentStorage>`, `Ref<dyn NeighborGrid>`,
    /// `Slot<DeviceBuffers>` and [`StepParams`] from the context, and
    /// [`StepTuning`] when present. Inserts the resulting [`StepReport`].
    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let params = ctx.require::<StepParams>()?.0;
        let lane = match ctx.get::<StepTuning>() {
            Some(tuning) => DisplacementLane::new(tuning.0.chunk_size),
            None => *self,
        };
        let storage = ctx.require::<Slot<dyn AgentStorage>>()?.get();
        let grid = ctx.require::<Ref<dyn NeighborGrid>>()?.get();
        let buffers = ctx.require::<Slot<DeviceBuffers>>()?.get();

        let report = lane.step(storage, grid, buffers, &params)?;
        ctx.insert(report);
        Ok(())
    }

    fn on_shutdown(&self, ctx: &mut LaneContext) {
        if let Some(buffers) = ctx.get::<Slot<DeviceBuffers>>() {
            buffers.get().teardown();
        }
    }
}
