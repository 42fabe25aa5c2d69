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

//! NUMA-partitioned agent storage.

use rayon::prelude::*;

use spheron_core::agent::{Agent, AgentHandle};
use spheron_core::error::DisplacementError;
use spheron_core::storage::{AgentStorage, AgentVisitor, AgentVisitorMut};

/// Agents stored as one dense vector per NUMA domain.
///
/// Parallel iteration splits every domain into fixed-size chunks and lets
/// rayon's work-stealing scheduler balance them across threads.
#[derive(Debug, Clone)]
pub struct AgentStore {
    domains: Vec<Vec<Agent>>,
}

impl Default for AgentStore {
    fn default() -> Self {
        Self::new(1)
    }
}

impl AgentStore {
    /// Creates an empty store with `numa_domains` domains (at least one).
    pub fn new(numa_domains: usize) -> Self {
        if numa_domains == 0 {
            log::warn!("AgentStore requested with zero NUMA domains, using one");
        }
        Self {
            domains: vec![Vec::new(); numa_domains.max(1)],
        }
    }

    /// Appends an agent to `domain`. Returns `None` if the domain does not exist.
    pub fn push(&mut self, domain: usize, agent: impl Into<Agent>) -> Option<AgentHandle> {
        let agents = self.domains.get_mut(domain)?;
        let handle = AgentHandle::new(domain as u16, agents.len() as u32);
        agents.push(agent.into());
        Some(handle)
    }

    /// Appends an agent to the least populated domain.
    pub fn push_balanced(&mut self, agent: impl Into<Agent>) -> AgentHandle {
        let domain = self
            .domains
            .iter()
            .enumerate()
            .min_by_key(|(_, agents)| agents.len())
            .map(|(d, _)| d)
            .unwrap_or(0);
        let agents = &mut self.domains[domain];
        let handle = AgentHandle::new(domain as u16, agents.len() as u32);
        agents.push(agent.into());
        handle
    }

    /// Iterates sequentially over every agent, domain by domain.
    pub fn iter(&self) -> impl Iterator<Item = (AgentHandle, &Agent)> + '_ {
        self.domains.iter().enumerate().flat_map(|(d, agents)| {
            agents
                .iter()
                .enumerate()
                .map(move |(i, agent)| (AgentHandle::new(d as u16, i as u32), agent))
        })
    }
}

impl AgentStorage for AgentStore {
    fn numa_domain_count(&self) -> usize {
        self.domains.len()
    }

    fn agent_count_in(&self, domain: usize) -> usize {
        self.domains.get(domain).map_or(0, Vec::len)
    }

    fn get(&self, handle: AgentHandle) -> Option<&Agent> {
        self.domains
            .get(handle.numa_domain())?
            .get(handle.local_index())
    }

    fn get_mut(&mut self, handle: AgentHandle) -> Option<&mut Agent> {
        self.domains
            .get_mut(handle.numa_domain())?
            .get_mut(handle.local_index())
    }

    fn try_for_each_parallel(
        &self,
        chunk_size: usize,
        f: &AgentVisitor<'_>,
    ) -> Result<(), DisplacementError> {
        let chunk_size = chunk_size.max(1);
        self.domains
            .par_iter()
            .enumerate()
            .try_for_each(|(domain, agents)| {
                agents
                    .par_chunks(chunk_size)
                    .enumerate()
                    .try_for_each(|(chunk, agents)| {
                        let base = chunk * chunk_size;
                        agents.iter().enumerate().try_for_each(|(i, agent)| {
                            f(AgentHandle::new(domain as u16, (base + i) as u32), agent)
                        })
                    })
            })
    }

    fn for_each_parallel_mut(&mut self, chunk_size: usize, f: &AgentVisitorMut<'_>) {
        let chunk_size = chunk_size.max(1);
        self.domains
            .par_iter_mut()
            .enumerate()
            .for_each(|(domain, agents)| {
                agents
                    .par_chunks_mut(chunk_size)
                    .enumerate()
                    .for_each(|(chunk, agents)| {
                        let base = chunk * chunk_size;
                        for (i, agent) in agents.iter_mut().enumerate() {
                            f(AgentHandle::new(domain as u16, (base + i) as u32), agent);
                        }
                    })
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spheron_core::agent::{Cell, Shape};
    use spheron_core::math::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn store_with(counts: &[usize]) -> AgentStore {
        let mut store = AgentStore::new(counts.len());
        for (d, &n) in counts.iter().enumerate() {
            for i in 0..n {
                store.push(d, Cell::new(Vec3::new(i as f32, d as f32, 0.0), 1.0));
            }
        }
        store
    }

    #[test]
    fn test_counts_per_domain() {
        let store = store_with(&[3, 0, 5]);
        assert_eq!(store.numa_domain_count(), 3);
        assert_eq!(store.agent_count_in(0), 3);
        assert_eq!(store.agent_count_in(1), 0);
        assert_eq!(store.agent_count_in(2), 5);
        assert_eq!(store.agent_count_in(7), 0);
        assert_eq!(store.total_agent_count(), 8);
    }

    #[test]
    fn test_zero_domains_clamped_to_one() {
        let store = AgentStore::new(0);
        assert_eq!(store.numa_domain_count(), 1);
    }

    #[test]
    fn test_push_to_missing_domain_fails() {
        let mut store = AgentStore::new(2);
        assert!(store.push(2, Cell::default()).is_none());
        let h = store.push(1, Cell::default()).unwrap();
        assert_eq!((h.numa_domain(), h.local_index()), (1, 0));
    }

    #[test]
    fn test_push_balanced_fills_smallest_domain() {
        let mut store = AgentStore::new(2);
        let a = store.push_balanced(Cell::default());
        let b = store.push_balanced(Cell::default());
        let c = store.push_balanced(Cell::default());
        assert_eq!(a.numa_domain(), 0);
        assert_eq!(b.numa_domain(), 1);
        assert_eq!(c.numa_domain(), 0);
        assert_eq!(c.local_index(), 1);
    }

    #[test]
    fn test_parallel_visit_sees_every_handle_once() {
        let store = store_with(&[2500, 10, 1001]);
        let seen = Mutex::new(Vec::new());
        store
            .try_for_each_parallel(1000, &|handle, agent| {
                assert_eq!(store.get(handle), Some(agent));
                seen.lock().unwrap().push(handle);
                Ok(())
            })
            .unwrap();
        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        let expected: Vec<_> = store.iter().map(|(h, _)| h).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_parallel_visit_stops_on_error() {
        let store = store_with(&[50]);
        let visited = AtomicUsize::new(0);
        let result = store.try_for_each_parallel(1, &|handle, _| {
            visited.fetch_add(1, Ordering::Relaxed);
            if handle.local_index() == 0 {
                Err(DisplacementError::ShapeViolation {
                    handle,
                    shape: Shape::Cube,
                })
            } else {
                Ok(())
            }
        });
        assert!(matches!(
            result,
            Err(DisplacementError::ShapeViolation { .. })
        ));
        assert!(visited.load(Ordering::Relaxed) >= 1);
    }

    #[test]
    fn test_parallel_mut_updates_every_agent() {
        let mut store = store_with(&[1200, 300]);
        store.for_each_parallel_mut(1000, &|handle, agent| {
            agent.set_position(Vec3::new(handle.local_index() as f32, 42.0, 0.0));
        });
        for (handle, agent) in store.iter() {
            assert_eq!(
                agent.position(),
                Vec3::new(handle.local_index() as f32, 42.0, 0.0)
            );
        }
    }
}
