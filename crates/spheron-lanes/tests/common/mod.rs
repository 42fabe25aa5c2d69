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

//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use spheron_core::agent::AgentHandle;
use spheron_core::device::{DeviceBackend, DeviceError};
use spheron_core::grid::{GridBox, GridGeometry, NeighborGrid};
use spheron_core::kernel::KernelArgs;
use spheron_core::math::Vec3;
use spheron_core::storage::AgentStorage;
use spheron_data::AgentStore;

/// Everything a [`StubDevice`] saw.
#[derive(Debug, Default)]
pub struct StubLog {
    pub allocations: Vec<(usize, usize)>,
    pub object_resizes: Vec<usize>,
    pub box_resizes: Vec<usize>,
    pub releases: usize,
    pub launches: usize,
    pub launched_positions: Vec<Vec<Vec3>>,
}

/// Scripted kernel back-end returning fixed displacements by flat index.
pub struct StubDevice {
    pub log: Arc<Mutex<StubLog>>,
    pub displacements: Vec<Vec3>,
    pub fail_launch: bool,
    pub fail_allocation: bool,
}

impl StubDevice {
    pub fn new(displacements: Vec<Vec3>) -> (Self, Arc<Mutex<StubLog>>) {
        let log = Arc::new(Mutex::new(StubLog::default()));
        (
            Self {
                log: Arc::clone(&log),
                displacements,
                fail_launch: false,
                fail_allocation: false,
            },
            log,
        )
    }
}

impl DeviceBackend for StubDevice {
    fn name(&self) -> &str {
        "stub"
    }

    fn allocate(&mut self, object_capacity: usize, box_capacity: usize) -> Result<(), DeviceError> {
        if self.fail_allocation {
            return Err(DeviceError::AllocationFailed {
                buffer: "objects",
                requested: object_capacity,
            });
        }
        self.log
            .lock()
            .unwrap()
            .allocations
            .push((object_capacity, box_capacity));
        Ok(())
    }

    fn resize_object_buffers(&mut self, capacity: usize) -> Result<(), DeviceError> {
        self.log.lock().unwrap().object_resizes.push(capacity);
        Ok(())
    }

    fn resize_box_buffers(&mut self, capacity: usize) -> Result<(), DeviceError> {
        self.log.lock().unwrap().box_resizes.push(capacity);
        Ok(())
    }

    fn launch(&mut self, args: &KernelArgs<'_>, displacements: &mut [Vec3]) -> Result<(), DeviceError> {
        let mut log = self.log.lock().unwrap();
        log.launches += 1;
        log.launched_positions.push(args.positions.to_vec());
        if self.fail_launch {
            return Err(DeviceError::LaunchFailed("scripted failure".into()));
        }
        for (i, out) in displacements.iter_mut().enumerate() {
            *out = self.displacements.get(i).copied().unwrap_or(Vec3::ZERO);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.log.lock().unwrap().releases += 1;
    }
}

/// A grid with a fixed number of boxes along x; agents are dealt into boxes
/// round-robin and chained by head insertion.
pub struct ChainGrid {
    boxes: Vec<GridBox>,
    successors: std::collections::HashMap<AgentHandle, AgentHandle>,
    geometry: GridGeometry,
}

impl ChainGrid {
    pub fn build(store: &mut AgentStore, box_count: usize) -> Self {
        let mut boxes = vec![GridBox::default(); box_count];
        let mut successors = std::collections::HashMap::new();
        let handles: Vec<AgentHandle> = store.iter().map(|(h, _)| h).collect();
        for (n, handle) in handles.into_iter().enumerate() {
            let b = n % box_count;
            if let Some(previous) = boxes[b].start {
                successors.insert(handle, previous);
            }
            boxes[b].start = Some(handle);
            boxes[b].length += 1;
            store.get_mut(handle).unwrap().set_box_idx(b as u32);
        }
        Self {
            boxes,
            successors,
            geometry: GridGeometry {
                box_length: 1,
                num_boxes_axis: [box_count as u32, 1, 1],
                dimensions: [0, 0, 0],
            },
        }
    }
}

impl NeighborGrid for ChainGrid {
    fn boxes(&self) -> &[GridBox] {
        &self.boxes
    }

    fn successor(&self, handle: AgentHandle) -> Option<AgentHandle> {
        self.successors.get(&handle).copied()
    }

    fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    fn largest_object_size(&self) -> f32 {
        1.0
    }
}

/// `count` unit cells on a line, spread over `domains` domains.
pub fn line_of_cells(count: usize, domains: usize) -> AgentStore {
    use spheron_core::agent::Cell;
    let mut store = AgentStore::new(domains);
    for i in 0..count {
        store.push_balanced(Cell::new(Vec3::new(i as f32 * 0.5, 0.0, 0.0), 1.0));
    }
    store
}

pub fn positions(store: &AgentStore) -> Vec<(AgentHandle, Vec3)> {
    store.iter().map(|(h, a)| (h, a.position())).collect()
}
