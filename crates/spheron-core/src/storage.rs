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

//! # Resource Manager Contract
//!
//! The agent container the displacement pipeline reads from and writes back
//! to. Agents are partitioned across NUMA domains; each domain has its own
//! dense local index space starting at zero.

use crate::agent::{Agent, AgentHandle};
use crate::error::DisplacementError;

/// Read-only per-agent callback used by [`AgentStorage::try_for_each_parallel`].
pub type AgentVisitor<'a> =
    dyn Fn(AgentHandle, &Agent) -> Result<(), DisplacementError> + Sync + 'a;

/// Mutating per-agent callback used by [`AgentStorage::for_each_parallel_mut`].
pub type AgentVisitorMut<'a> = dyn Fn(AgentHandle, &mut Agent) + Sync + 'a;

/// Interface contract for the agent container (the resource manager).
pub trait AgentStorage: Send + Sync {
    /// Number of NUMA domains. Always at least one.
    fn numa_domain_count(&self) -> usize;

    /// Number of agents stored in `domain`.
    fn agent_count_in(&self, domain: usize) -> usize;

    /// Number of agents across all domains.
    fn total_agent_count(&self) -> usize {
        (0..self.numa_domain_count())
            .map(|d| self.agent_count_in(d))
            .sum()
    }

    /// Looks up an agent.
    fn get(&self, handle: AgentHandle) -> Option<&Agent>;

    /// Looks up an agent mutably.
    fn get_mut(&mut self, handle: AgentHandle) -> Option<&mut Agent>;

    /// Calls `f` for every agent using dynamically scheduled chunks of
    /// `chunk_size` agents. Iteration stops at the first error, which is
    /// returned.
    fn try_for_each_parallel(
        &self,
        chunk_size: usize,
        f: &AgentVisitor<'_>,
    ) -> Result<(), DisplacementError>;

    /// Calls `f` with mutable access for every agent using dynamically
    /// scheduled chunks of `chunk_size` agents.
    fn for_each_parallel_mut(&mut self, chunk_size: usize, f: &AgentVisitorMut<'_>);
}
