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

//! Defines the DisplacementAgent, the orchestrator of the displacement step.

use anyhow::{anyhow, Context};
use spheron_core::config::{DisplacementConfig, SimulationParams};
use spheron_core::device::DeviceBackend;
use spheron_core::grid::NeighborGrid;
use spheron_core::lane::{Lane, LaneContext, LaneError, Ref, Slot, StepParams, StepTuning};
use spheron_core::storage::AgentStorage;
use spheron_infra::HostDevice;
use spheron_lanes::displacement_lane::{DeviceBuffers, DisplacementLane, StepReport};

/// Strategies for computing displacements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplacementStrategy {
    /// Offload the force computation to a device back-end.
    #[default]
    Accelerated,
}

/// The agent responsible for the displacement step.
///
/// Owns the [`DeviceBuffers`] so their capacities persist between steps.
pub struct DisplacementAgent {
    buffers: DeviceBuffers,
    lane: DisplacementLane,
    strategy: DisplacementStrategy,
    config: DisplacementConfig,
    last_report: Option<StepReport>,
    steps: u64,
}

impl DisplacementAgent {
    /// Creates an agent driving `backend`.
    pub fn new(backend: Box<dyn DeviceBackend>, config: DisplacementConfig) -> Self {
        Self {
            buffers: DeviceBuffers::new(backend, config.growth_factor),
            lane: DisplacementLane::new(config.chunk_size),
            strategy: DisplacementStrategy::Accelerated,
            config,
            last_report: None,
            steps: 0,
        }
    }

    /// Creates an agent on the host-memory device.
    pub fn with_host_device(config: DisplacementConfig) -> Self {
        Self::new(Box::new(HostDevice::new()), config)
    }

    /// Current pipeline tuning.
    pub fn config(&self) -> &DisplacementConfig {
        &self.config
    }

    /// Replaces the pipeline tuning. Capacities already allocated are kept.
    pub fn set_config(&mut self, config: DisplacementConfig) {
        self.buffers.set_growth_factor(config.growth_factor);
        self.lane = DisplacementLane::new(config.chunk_size);
        self.config = config;
    }

    /// Current strategy.
    pub fn strategy(&self) -> DisplacementStrategy {
        self.strategy
    }

    /// The lane serving the current strategy.
    pub fn select_lane(&self) -> &dyn Lane {
        match self.strategy {
            DisplacementStrategy::Accelerated => &self.lane,
        }
    }

    /// Device buffer set owned by this agent.
    pub fn buffers(&self) -> &DeviceBuffers {
        &self.buffers
    }

    /// Report of the last successful step.
    pub fn last_report(&self) -> Option<&StepReport> {
        self.last_report.as_ref()
    }

    /// Number of successful steps.
    pub fn steps_completed(&self) -> u64 {
        self.steps
    }

    /// Runs one displacement step over `storage` through the selected lane.
    pub fn execute(
        &mut self,
        storage: &mut (dyn AgentStorage + 'static),
        grid: &(dyn NeighborGrid + 'static),
        params: &SimulationParams,
    ) -> anyhow::Result<StepReport> {
        let mut ctx = LaneContext::new();
        ctx.insert(StepParams(*params));
        ctx.insert(StepTuning(self.config));
        ctx.insert(Slot::<dyn AgentStorage>::new(storage));
        ctx.insert(Ref::<dyn NeighborGrid>::new(grid));
        ctx.insert(Slot::new(&mut self.buffers));

        let lane = match self.strategy {
            DisplacementStrategy::Accelerated => &self.lane,
        };
        let step = self.steps + 1;
        let report = lane
            .execute(&mut ctx)
            .map_err(|err| match err {
                LaneError::Step(err) => anyhow::Error::new(err),
                other => anyhow::Error::new(other),
            })
            .and_then(|()| {
                ctx.take::<StepReport>()
                    .ok_or_else(|| anyhow!("lane finished without a step report"))
            })
            .with_context(|| format!("{} step {step} failed", lane.strategy_name()))?;

        self.steps += 1;
        log::debug!(
            "Displacement step {}: {} agents, {} boxes, capacity {}/{}{} in {:?}",
            self.steps,
            report.agent_count,
            report.box_count,
            report.capacity.object_capacity,
            report.capacity.box_capacity,
            if report.capacity.reallocated() {
                " (reallocated)"
            } else {
                ""
            },
            report.elapsed
        );
        self.last_report = Some(report);
        Ok(report)
    }

    /// Releases the device buffers. The next step allocates from scratch.
    pub fn teardown(&mut self) {
        let mut ctx = LaneContext::new();
        ctx.insert(Slot::new(&mut self.buffers));
        self.select_lane().on_shutdown(&mut ctx);
    }
}

impl std::fmt::Debug for DisplacementAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplacementAgent")
            .field("strategy", &self.strategy)
            .field("buffers", &self.buffers)
            .field("steps", &self.steps)
            .finish()
    }
}
