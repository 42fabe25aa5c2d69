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

//! # Neighbor Grid Contract
//!
//! The uniform spatial grid used for broad-phase neighbor pruning. Agents in
//! a box form a singly linked chain: the box stores the head and its length,
//! and each agent knows its successor within the box.

use serde::{Deserialize, Serialize};

use crate::agent::AgentHandle;

/// A single grid box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridBox {
    /// First agent of the box chain, `None` for an empty box.
    pub start: Option<AgentHandle>,
    /// Number of agents in the chain.
    pub length: u16,
}

/// Global grid geometry as consumed by the displacement kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridGeometry {
    /// Edge length of a box.
    pub box_length: u32,
    /// Number of boxes along each axis.
    pub num_boxes_axis: [u32; 3],
    /// Integral lower corner of the grid along each axis.
    pub dimensions: [i32; 3],
}

impl GridGeometry {
    /// Total number of boxes implied by `num_boxes_axis`, or `None` when the
    /// product does not fit in `usize`.
    pub fn box_count(&self) -> Option<usize> {
        self.num_boxes_axis
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n as usize))
    }
}

/// Interface contract for the spatial neighbor grid.
pub trait NeighborGrid: Send + Sync {
    /// Every box in native enumeration order (x fastest, then y, then z),
    /// empty boxes included.
    fn boxes(&self) -> &[GridBox];

    /// The next agent sharing `handle`'s box, or `None` at the end of the chain.
    fn successor(&self, handle: AgentHandle) -> Option<AgentHandle>;

    /// Box edge length, boxes per axis, and grid lower corner.
    fn geometry(&self) -> GridGeometry;

    /// Largest extent of any agent in the grid.
    fn largest_object_size(&self) -> f32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_box_count() {
        let g = GridGeometry {
            box_length: 2,
            num_boxes_axis: [3, 4, 5],
            dimensions: [0, 0, 0],
        };
        assert_eq!(g.box_count(), Some(60));
        assert_eq!(GridGeometry::default().box_count(), Some(0));
    }

    #[test]
    fn test_geometry_box_count_overflow() {
        let g = GridGeometry {
            box_length: 1,
            num_boxes_axis: [u32::MAX; 3],
            dimensions: [0, 0, 0],
        };
        assert_eq!(g.box_count(), None);
    }
}
