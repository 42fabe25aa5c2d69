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

//! Reads box ranges and global geometry from the neighbor grid.

use spheron_core::error::DisplacementError;
use spheron_core::grid::{GridGeometry, NeighborGrid};
use spheron_core::kernel::EMPTY_BOX;

use super::offsets::NumaOffsetTable;

/// Per-box arrays and scalar geometry in the form the kernel expects.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    /// Flat index of the first agent of each box, or [`EMPTY_BOX`].
    pub box_starts: Vec<u32>,
    /// Number of agents in each box.
    pub box_lengths: Vec<u16>,
    /// Box edge length, boxes per axis, and integral lower corner.
    pub geometry: GridGeometry,
    /// Squared largest-object interaction radius.
    pub squared_radius: f32,
}

impl GridSnapshot {
    /// Number of boxes, occupied or not.
    pub fn box_count(&self) -> usize {
        self.box_starts.len()
    }
}

/// Translates the grid's handle-based boxes into flat-index ranges.
pub struct GridBridge;

impl GridBridge {
    /// Reads `grid` in its native box order.
    ///
    /// Fails with [`DisplacementError::GridAccess`] when the box list does not
    /// match the advertised geometry, or when a box start or length disagrees
    /// with the agent population described by `offsets`.
    pub fn read(
        grid: &dyn NeighborGrid,
        offsets: &NumaOffsetTable,
    ) -> Result<GridSnapshot, DisplacementError> {
        let geometry = grid.geometry();
        let boxes = grid.boxes();
        let expected = geometry.box_count().ok_or_else(|| {
            DisplacementError::GridAccess(format!(
                "grid geometry {:?} overflows the box count",
                geometry.num_boxes_axis
            ))
        })?;
        if boxes.len() != expected {
            return Err(DisplacementError::GridAccess(format!(
                "grid lists {} boxes but its geometry {:?} implies {expected}",
                boxes.len(),
                geometry.num_boxes_axis,
            )));
        }
        if geometry.box_length == 0 {
            return Err(DisplacementError::GridAccess(
                "box edge length is zero".to_string(),
            ));
        }

        let mut box_starts = Vec::with_capacity(boxes.len());
        let mut box_lengths = Vec::with_capacity(boxes.len());
        let mut occupied: usize = 0;
        for (idx, grid_box) in boxes.iter().enumerate() {
            let start = match (grid_box.start, grid_box.length) {
                (None, 0) => EMPTY_BOX,
                (Some(handle), len) if len > 0 => {
                    offsets.flat_index(handle).ok_or_else(|| {
                        DisplacementError::GridAccess(format!(
                            "box {idx} starts at unknown agent {handle}"
                        ))
                    })?
                }
                (start, len) => {
                    return Err(DisplacementError::GridAccess(format!(
                        "box {idx} has start {start:?} but length {len}"
                    )))
                }
            };
            occupied += grid_box.length as usize;
            box_starts.push(start);
            box_lengths.push(grid_box.length);
        }
        if occupied != offsets.total() {
            return Err(DisplacementError::GridAccess(format!(
                "boxes hold {occupied} agents but the population has {}",
                offsets.total()
            )));
        }

        let radius = grid.largest_object_size();
        Ok(GridSnapshot {
            box_starts,
            box_lengths,
            geometry,
            squared_radius: radius * radius,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spheron_core::agent::AgentHandle;
    use spheron_core::grid::GridBox;

    struct FixedGrid {
        boxes: Vec<GridBox>,
        geometry: GridGeometry,
    }

    impl NeighborGrid for FixedGrid {
        fn boxes(&self) -> &[GridBox] {
            &self.boxes
        }
        fn successor(&self, _handle: AgentHandle) -> Option<AgentHandle> {
            None
        }
        fn geometry(&self) -> GridGeometry {
            self.geometry
        }
        fn largest_object_size(&self) -> f32 {
            1.5
        }
    }

    fn geometry(nx: u32) -> GridGeometry {
        GridGeometry {
            box_length: 2,
            num_boxes_axis: [nx, 1, 1],
            dimensions: [-1, 0, 0],
        }
    }

    #[test]
    fn test_translates_box_starts_to_flat_indices() {
        let offsets = NumaOffsetTable::from_counts(&[1, 2]).unwrap();
        let grid = FixedGrid {
            boxes: vec![
                GridBox {
                    start: Some(AgentHandle::new(1, 1)),
                    length: 2,
                },
                GridBox {
                    start: None,
                    length: 0,
                },
                GridBox {
                    start: Some(AgentHandle::new(0, 0)),
                    length: 1,
                },
            ],
            geometry: geometry(3),
        };

        let snapshot = GridBridge::read(&grid, &offsets).unwrap();
        assert_eq!(snapshot.box_starts, vec![2, EMPTY_BOX, 0]);
        assert_eq!(snapshot.box_lengths, vec![2, 0, 1]);
        assert_eq!(snapshot.box_count(), 3);
        assert_eq!(snapshot.geometry, geometry(3));
        assert_eq!(snapshot.squared_radius, 2.25);
    }

    #[test]
    fn test_box_count_mismatch_is_grid_access_error() {
        let offsets = NumaOffsetTable::from_counts(&[0]).unwrap();
        let grid = FixedGrid {
            boxes: vec![GridBox::default(); 2],
            geometry: geometry(3),
        };
        let err = GridBridge::read(&grid, &offsets).unwrap_err();
        assert!(matches!(err, DisplacementError::GridAccess(_)));
    }

    #[test]
    fn test_overflowing_geometry_is_grid_access_error() {
        let offsets = NumaOffsetTable::from_counts(&[0]).unwrap();
        let grid = FixedGrid {
            boxes: Vec::new(),
            geometry: GridGeometry {
                num_boxes_axis: [u32::MAX; 3],
                ..geometry(1)
            },
        };
        let err = GridBridge::read(&grid, &offsets).unwrap_err();
        assert!(matches!(err, DisplacementError::GridAccess(_)));
    }

    #[test]
    fn test_unknown_start_agent_is_grid_access_error() {
        let offsets = NumaOffsetTable::from_counts(&[1]).unwrap();
        let grid = FixedGrid {
            boxes: vec![GridBox {
                start: Some(AgentHandle::new(3, 0)),
                length: 1,
            }],
            geometry: geometry(1),
        };
        let err = GridBridge::read(&grid, &offsets).unwrap_err();
        assert!(matches!(err, DisplacementError::GridAccess(_)));
    }

    #[test]
    fn test_occupancy_must_cover_population() {
        let offsets = NumaOffsetTable::from_counts(&[2]).unwrap();
        let grid = FixedGrid {
            boxes: vec![GridBox {
                start: Some(AgentHandle::new(0, 0)),
                length: 1,
            }],
            geometry: geometry(1),
        };
        let err = GridBridge::read(&grid, &offsets).unwrap_err();
        assert!(matches!(err, DisplacementError::GridAccess(_)));
    }
}
