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

//! Parallel scatter of kernel displacements back into agent state.

use spheron_core::config::SimulationParams;
use spheron_core::device::DeviceError;
use spheron_core::error::DisplacementError;
use spheron_core::math::Vec3;
use spheron_core::storage::AgentStorage;

use super::offsets::NumaOffsetTable;

/// Writes `position + displacement` into every agent, then clamps it when
/// the simulation space is bounded.
#[derive(Debug, Clone, Copy)]
pub struct PositionCommitter {
    chunk_size: usize,
}

impl PositionCommitter {
    /// Creates a committer scheduling `chunk_size` agents per task.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Commits `displacements`, indexed by the flat indices of `offsets`.
    ///
    /// `displacements` must hold one vector per agent; it is checked before
    /// any agent is touched.
    pub fn commit(
        &self,
        storage: &mut dyn AgentStorage,
        offsets: &NumaOffsetTable,
        displacements: &[Vec3],
        params: &SimulationParams,
    ) -> Result<(), DisplacementError> {
        if displacements.len() != offsets.total()
            || storage.total_agent_count() != offsets.total()
        {
            return Err(DisplacementError::Kernel(DeviceError::InvalidArguments(
                format!(
                    "{} displacements for {} agents",
                    displacements.len(),
                    storage.total_agent_count()
                ),
            )));
        }

        let bounds = params
            .bound_space
            .then_some((params.min_bound, params.max_bound));
        storage.for_each_parallel_mut(self.chunk_size, &|handle, agent| {
            let Some(idx) = offsets.flat_index(handle) else {
                return;
            };
            let moved = agent.position() + displacements[idx as usize];
            agent.set_position(moved);
            if let Some((min_bound, max_bound)) = bounds {
                agent.apply_bounding_box(min_bound, max_bound);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spheron_core::agent::{AgentHandle, Cell};
    use spheron_data::AgentStore;

    fn store_with(positions: &[(usize, Vec3)]) -> (AgentStore, Vec<AgentHandle>) {
        let mut store = AgentStore::new(2);
        let handles = positions
            .iter()
            .map(|&(d, p)| store.push(d, Cell::new(p, 1.0)).unwrap())
            .collect();
        (store, handles)
    }

    fn displacement_for(offsets: &NumaOffsetTable, moves: &[(AgentHandle, Vec3)]) -> Vec<Vec3> {
        let mut out = vec![Vec3::ZERO; offsets.total()];
        for &(h, d) in moves {
            out[offsets.flat_index(h).unwrap() as usize] = d;
        }
        out
    }

    #[test]
    fn test_commit_adds_displacement_across_domains() {
        let (mut store, h) = store_with(&[
            (0, Vec3::new(1.0, 1.0, 1.0)),
            (1, Vec3::new(5.0, 5.0, 5.0)),
            (1, Vec3::new(9.0, 0.0, 0.0)),
        ]);
        let offsets = NumaOffsetTable::from_storage(&store).unwrap();
        let d = displacement_for(
            &offsets,
            &[
                (h[0], Vec3::new(0.5, 0.0, 0.0)),
                (h[1], Vec3::new(0.0, -1.0, 0.0)),
                (h[2], Vec3::new(0.0, 0.0, 2.0)),
            ],
        );

        PositionCommitter::new(1)
            .commit(&mut store, &offsets, &d, &SimulationParams::default())
            .unwrap();

        assert_eq!(store.get(h[0]).unwrap().position(), Vec3::new(1.5, 1.0, 1.0));
        assert_eq!(store.get(h[1]).unwrap().position(), Vec3::new(5.0, 4.0, 5.0));
        assert_eq!(store.get(h[2]).unwrap().position(), Vec3::new(9.0, 0.0, 2.0));
    }

    #[test]
    fn test_bounding_clamp_to_nearer_bound() {
        let (mut store, h) = store_with(&[(0, Vec3::new(0.5, 0.5, 0.5)), (1, Vec3::ZERO)]);
        let offsets = NumaOffsetTable::from_storage(&store).unwrap();
        let d = displacement_for(
            &offsets,
            &[
                (h[0], Vec3::new(1.0, -1.0, 0.25)),
                (h[1], Vec3::new(-0.3, 1.7, 0.9)),
            ],
        );
        let params = SimulationParams {
            bound_space: true,
            min_bound: 0.0,
            max_bound: 1.0,
            ..Default::default()
        };

        PositionCommitter::new(8)
            .commit(&mut store, &offsets, &d, &params)
            .unwrap();

        assert_eq!(store.get(h[0]).unwrap().position(), Vec3::new(1.0, 0.0, 0.75));
        assert_eq!(store.get(h[1]).unwrap().position(), Vec3::new(0.0, 1.0, 0.9));
    }

    #[test]
    fn test_unbounded_positions_pass_through() {
        let (mut store, h) = store_with(&[(0, Vec3::new(0.5, 0.5, 0.5))]);
        let offsets = NumaOffsetTable::from_storage(&store).unwrap();
        let d = vec![Vec3::new(2.0, -3.0, 0.0)];
        let params = SimulationParams {
            bound_space: false,
            min_bound: 0.0,
            max_bound: 1.0,
            ..Default::default()
        };

        PositionCommitter::new(8)
            .commit(&mut store, &offsets, &d, &params)
            .unwrap();

        assert_eq!(store.get(h[0]).unwrap().position(), Vec3::new(2.5, -2.5, 0.5));
    }

    #[test]
    fn test_wrong_displacement_count_touches_nothing() {
        let (mut store, h) = store_with(&[(0, Vec3::ONE), (1, Vec3::ONE)]);
        let offsets = NumaOffsetTable::from_storage(&store).unwrap();
        let err = PositionCommitter::new(8)
            .commit(&mut store, &offsets, &[Vec3::ONE], &SimulationParams::default())
            .unwrap_err();
        assert!(matches!(err, DisplacementError::Kernel(_)));
        assert_eq!(store.get(h[0]).unwrap().position(), Vec3::ONE);
        assert_eq!(store.get(h[1]).unwrap().position(), Vec3::ONE);
    }
}
