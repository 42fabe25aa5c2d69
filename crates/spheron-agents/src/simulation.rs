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

//! The simulation facade exposing a zero-argument step.

use anyhow::{bail, Context};
use spheron_core::config::{SimulationParams, SpheronConfig};
use spheron_core::device::DeviceBackend;
use spheron_data::{AgentStore, UniformGrid};
use spheron_infra::HostDevice;

use crate::displacement_agent::DisplacementAgent;

/// Agents, their neighbor grid, and the displacement agent driving them.
///
/// A failed step is fatal: every later [`step`](Self::step) is refused.
#[derive(Debug)]
pub struct Simulation {
    store: AgentStore,
    grid: UniformGrid,
    params: SimulationParams,
    displacement: DisplacementAgent,
    failed: bool,
}

impl Simulation {
    /// Creates a simulation over `store` with the given device back-end.
    pub fn new(
        store: AgentStore,
        config: &SpheronConfig,
        backend: Box<dyn DeviceBackend>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid simulation configuration")?;
        Ok(Self {
            store,
            grid: UniformGrid::new(),
            params: config.simulation,
            displacement: DisplacementAgent::new(backend, config.displacement),
            failed: false,
        })
    }

    /// Creates a simulation on the host-memory device.
    pub fn with_host_device(store: AgentStore, config: &SpheronConfig) -> anyhow::Result<Self> {
        Self::new(store, config, Box::new(HostDevice::new()))
    }

    /// Rebuilds the neighbor grid, then moves every agent by its
    /// displacement.
    pub fn step(&mut self) -> anyhow::Result<()> {
        if self.failed {
            bail!("simulation was aborted by an earlier failed step");
        }
        let result = self.run_step();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn run_step(&mut self) -> anyhow::Result<()> {
        self.grid
            .update(&mut self.store)
            .context("failed to rebuild the neighbor grid")?;
        self.displacement
            .execute(&mut self.store, &self.grid, &self.params)?;
        Ok(())
    }

    /// Runs `steps` consecutive steps, stopping at the first failure.
    pub fn run(&mut self, steps: usize) -> anyhow::Result<()> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// The agents.
    pub fn store(&self) -> &AgentStore {
        &self.store
    }

    /// The agents, mutably. The grid is rebuilt on the next step.
    pub fn store_mut(&mut self) -> &mut AgentStore {
        &mut self.store
    }

    /// Neighbor grid as of the last step.
    pub fn grid(&self) -> &UniformGrid {
        &self.grid
    }

    /// Parameters read by every step.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Replaces the parameters used from the next step on. Invalid
    /// parameters are rejected and the current ones kept.
    pub fn set_params(&mut self, params: SimulationParams) -> anyhow::Result<()> {
        params.validate().context("invalid simulation parameters")?;
        self.params = params;
        Ok(())
    }

    /// The displacement agent.
    pub fn displacement(&self) -> &DisplacementAgent {
        &self.displacement
    }

    /// Whether a step has failed.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Releases device resources. A later step re-allocates them.
    pub fn teardown(&mut self) {
        self.displacement.teardown();
    }
}
