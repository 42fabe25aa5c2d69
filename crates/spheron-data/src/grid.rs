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

//! A uniform spatial grid with per-box successor chains.

use spheron_core::agent::AgentHandle;
use spheron_core::error::DisplacementError;
use spheron_core::grid::{GridBox, GridGeometry, NeighborGrid};
use spheron_core::math::Vec3;
use spheron_core::storage::AgentStorage;

/// Uniform grid whose box edge equals the largest agent extent.
///
/// Rebuilt from scratch by [`UniformGrid::update`]. Boxes are enumerated
/// with x varying fastest, then y, then z. Agents are head-inserted into
/// their box chain, so a chain lists its agents in reverse insertion order.
#[derive(Debug, Clone, Default)]
pub struct UniformGrid {
    boxes: Vec<GridBox>,
    /// Successor per agent, indexed `[domain][local_index]`.
    successors: Vec<Vec<Option<AgentHandle>>>,
    geometry: GridGeometry,
    largest_object_size: f32,
}

impl UniformGrid {
    /// Creates an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds boxes and successor chains from the current agent positions
    /// and records every agent's box index on the agent itself.
    pub fn update<S: AgentStorage + ?Sized>(&mut self, storage: &mut S) -> Result<(), DisplacementError> {
        let domain_count = storage.numa_domain_count();
        self.boxes.clear();
        self.successors = (0..domain_count)
            .map(|d| vec![None; storage.agent_count_in(d)])
            .collect();

        let handles: Vec<AgentHandle> = (0..domain_count)
            .flat_map(|d| {
                (0..storage.agent_count_in(d)).map(move |i| AgentHandle::new(d as u16, i as u32))
            })
            .collect();

        let mut largest = 0.0f32;
        let mut lower = Vec3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut upper = Vec3::new(f32::MIN, f32::MIN, f32::MIN);
        for &handle in &handles {
            let agent = storage
                .get(handle)
                .ok_or_else(|| DisplacementError::GridAccess(format!("agent {handle} vanished")))?;
            largest = largest.max(agent.max_extent());
            lower = lower.min(agent.position());
            upper = upper.max(agent.position());
        }
        self.largest_object_size = largest;

        if handles.is_empty() {
            self.geometry = GridGeometry {
                box_length: 1,
                ..Default::default()
            };
            return Ok(());
        }

        let box_length = (largest.ceil() as u32).max(1);
        let dimensions = [
            lower.x.floor() as i32,
            lower.y.floor() as i32,
            lower.z.floor() as i32,
        ];
        let mut num_boxes_axis = [0u32; 3];
        for axis in 0..3 {
            let extent = (upper[axis].floor() as i64 - dimensions[axis] as i64).max(0);
            num_boxes_axis[axis] = u32::try_from(extent / box_length as i64 + 1).map_err(|_| {
                DisplacementError::GridAccess(format!(
                    "population spans {extent} units on axis {axis}, too many boxes of edge {box_length}"
                ))
            })?;
        }
        let geometry = GridGeometry {
            box_length,
            num_boxes_axis,
            dimensions,
        };

        let box_count = geometry
            .box_count()
            .filter(|&count| count <= u32::MAX as usize)
            .ok_or_else(|| {
                DisplacementError::GridAccess(format!(
                    "{num_boxes_axis:?} boxes exceed the 32-bit box id space"
                ))
            })?;
        self.geometry = geometry;
        self.boxes = vec![GridBox::default(); box_count];

        for &handle in &handles {
            let position = match storage.get(handle) {
                Some(agent) => agent.position(),
                None => continue,
            };
            let box_idx = self.box_index_of(position);
            let grid_box = &mut self.boxes[box_idx];
            grid_box.length = grid_box.length.checked_add(1).ok_or_else(|| {
                DisplacementError::GridAccess(format!("box {box_idx} holds more than {} agents", u16::MAX))
            })?;
            self.successors[handle.numa_domain()][handle.local_index()] = grid_box.start;
            grid_box.start = Some(handle);
            if let Some(agent) = storage.get_mut(handle) {
                agent.set_box_idx(box_idx as u32);
            }
        }

        log::trace!(
            "Grid rebuilt: {} agents in {} boxes of edge {}",
            handles.len(),
            box_count,
            box_length
        );
        Ok(())
    }

    /// Integer box coordinates of `position`, clamped into the grid.
    pub fn box_coordinates(&self, position: Vec3) -> [u32; 3] {
        let mut coords = [0u32; 3];
        let edge = self.geometry.box_length.max(1) as f32;
        for (axis, coord) in coords.iter_mut().enumerate() {
            let offset = position[axis] - self.geometry.dimensions[axis] as f32;
            let c = (offset / edge).floor().max(0.0) as u32;
            *coord = c.min(self.geometry.num_boxes_axis[axis].saturating_sub(1));
        }
        coords
    }

    /// Box id of `position`.
    pub fn box_index_of(&self, position: Vec3) -> usize {
        let [x, y, z] = self.box_coordinates(position);
        let [nx, ny, _] = self.geometry.num_boxes_axis;
        (z as usize * ny as usize + y as usize) * nx as usize + x as usize
    }
}

impl NeighborGrid for UniformGrid {
    fn boxes(&self) -> &[GridBox] {
        &self.boxes
    }

    fn successor(&self, handle: AgentHandle) -> Option<AgentHandle> {
        self.successors
            .get(handle.numa_domain())?
            .get(handle.local_index())
            .copied()
            .flatten()
    }

    fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    fn largest_object_size(&self) -> f32 {
        self.largest_object_size
    }
}
