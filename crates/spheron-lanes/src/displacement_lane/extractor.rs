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

//! Parallel gather of per-agent attributes into flat kernel buffers.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use spheron_core::agent::{AgentHandle, Shape};
use spheron_core::error::DisplacementError;
use spheron_core::grid::NeighborGrid;
use spheron_core::kernel::NO_SUCCESSOR;
use spheron_core::math::Vec3;
use spheron_core::storage::AgentStorage;

use super::offsets::NumaOffsetTable;

/// Struct-of-arrays view of every agent, keyed by flat index.
///
/// Rebuilt from scratch on every step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatAttributeBuffer {
    /// Agent centers.
    pub positions: Vec<Vec3>,
    /// Agent diameters.
    pub diameters: Vec<f32>,
    /// Adherence thresholds.
    pub adherence: Vec<f32>,
    /// Externally applied forces.
    pub tractor_forces: Vec<Vec3>,
    /// Agent masses.
    pub masses: Vec<f32>,
    /// Grid box of every agent.
    pub box_ids: Vec<u32>,
    /// Flat index of the next agent in the same box, or [`NO_SUCCESSOR`].
    pub successors: Vec<u32>,
}

impl FlatAttributeBuffer {
    fn zeroed(len: usize) -> Self {
        Self {
            positions: vec![Vec3::ZERO; len],
            diameters: vec![0.0; len],
            adherence: vec![0.0; len],
            tractor_forces: vec![Vec3::ZERO; len],
            masses: vec![0.0; len],
            box_ids: vec![0; len],
            successors: vec![NO_SUCCESSOR; len],
        }
    }

    /// Number of agents described.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the buffer describes no agent.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Shared write access to a slice where every index is written by at most
/// one thread. Exclusivity is granted per index by [`FlatWriters::claim`].
struct DisjointSlots<'a, T> {
    ptr: *mut T,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: writers only touch distinct indices (see `write`).
unsafe impl<T: Send> Send for DisjointSlots<'_, T> {}
unsafe impl<T: Send> Sync for DisjointSlots<'_, T> {}

impl<'a, T: Copy> DisjointSlots<'a, T> {
    fn new(slice: &'a mut [T]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// The caller must hold the claim on `idx`, so no other thread writes it
    /// while `self` is shared.
    #[inline]
    unsafe fn write(&self, idx: usize, value: T) {
        assert!(idx < self.len, "flat index {idx} out of {}", self.len);
        *self.ptr.add(idx) = value;
    }
}

struct FlatWriters<'a> {
    positions: DisjointSlots<'a, Vec3>,
    diameters: DisjointSlots<'a, f32>,
    adherence: DisjointSlots<'a, f32>,
    tractor_forces: DisjointSlots<'a, Vec3>,
    masses: DisjointSlots<'a, f32>,
    box_ids: DisjointSlots<'a, u32>,
    successors: DisjointSlots<'a, u32>,
    claimed: Vec<AtomicBool>,
    written: AtomicUsize,
}

impl<'a> FlatWriters<'a> {
    fn new(buffer: &'a mut FlatAttributeBuffer) -> Self {
        let len = buffer.len();
        Self {
            claimed: (0..len).map(|_| AtomicBool::new(false)).collect(),
            written: AtomicUsize::new(0),
            positions: DisjointSlots::new(&mut buffer.positions),
            diameters: DisjointSlots::new(&mut buffer.diameters),
            adherence: DisjointSlots::new(&mut buffer.adherence),
            tractor_forces: DisjointSlots::new(&mut buffer.tractor_forces),
            masses: DisjointSlots::new(&mut buffer.masses),
            box_ids: DisjointSlots::new(&mut buffer.box_ids),
            successors: DisjointSlots::new(&mut buffer.successors),
        }
    }

    /// Takes the exclusive right to write slot `idx`. Fails if the slot is
    /// out of range or another visit already claimed it.
    fn claim(&self, idx: usize, handle: AgentHandle) -> Result<(), DisplacementError> {
        let flag = self.claimed.get(idx).ok_or_else(|| {
            DisplacementError::GridAccess(format!("agent {handle} maps past the population"))
        })?;
        if flag.swap(true, Ordering::AcqRel) {
            return Err(DisplacementError::GridAccess(format!(
                "agent {handle} was visited more than once"
            )));
        }
        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn written(&self) -> usize {
        self.written.load(Ordering::Acquire)
    }
}

/// Gathers agent attributes with the storage's chunked parallel fan-out.
#[derive(Debug, Clone, Copy)]
pub struct AttributeExtractor {
    chunk_size: usize,
}

impl AttributeExtractor {
    /// Creates an extractor scheduling `chunk_size` agents per task.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Fills a [`FlatAttributeBuffer`] for every agent in `storage`.
    ///
    /// The first agent without accelerated displacement support aborts the
    /// fan-out with [`DisplacementError::ShapeViolation`]. A box id outside
    /// `[0, box_count)` or a successor outside the population aborts it with
    /// [`DisplacementError::GridAccess`], as does a storage that visits an
    /// agent twice or leaves one out.
    pub fn extract(
        &self,
        storage: &dyn AgentStorage,
        grid: &dyn NeighborGrid,
        offsets: &NumaOffsetTable,
        box_count: usize,
    ) -> Result<FlatAttributeBuffer, DisplacementError> {
        let mut buffer = FlatAttributeBuffer::zeroed(offsets.total());
        {
            let writers = FlatWriters::new(&mut buffer);
            storage.try_for_each_parallel(self.chunk_size, &|handle, agent| {
                let cell = match agent.as_cell() {
                    Some(cell) if agent.capabilities().accelerated_displacement => cell,
                    _ => {
                        return Err(DisplacementError::ShapeViolation {
                            handle,
                            shape: agent.shape(),
                        })
                    }
                };
                debug_assert_eq!(agent.shape(), Shape::Sphere);

                let idx = flat_index(offsets, handle)? as usize;
                if cell.box_idx as usize >= box_count {
                    return Err(DisplacementError::GridAccess(format!(
                        "agent {handle} is in box {} of {box_count}",
                        cell.box_idx
                    )));
                }
                let successor = match grid.successor(handle) {
                    Some(next) => flat_index(offsets, next)?,
                    None => NO_SUCCESSOR,
                };

                writers.claim(idx, handle)?;
                // SAFETY: `claim` succeeded, so this visitor is the only one
                // that ever writes slot `idx`.
                unsafe {
                    writers.positions.write(idx, cell.position);
                    writers.diameters.write(idx, cell.diameter);
                    writers.adherence.write(idx, cell.adherence);
                    writers.tractor_forces.write(idx, cell.tractor_force);
                    writers.masses.write(idx, cell.mass());
                    writers.box_ids.write(idx, cell.box_idx);
                    writers.successors.write(idx, successor);
                }
                Ok(())
            })?;
            let written = writers.written();
            if written != offsets.total() {
                return Err(DisplacementError::GridAccess(format!(
                    "storage visited {written} of {} agents",
                    offsets.total()
                )));
            }
        }
        Ok(buffer)
    }
}

fn flat_index(offsets: &NumaOffsetTable, handle: AgentHandle) -> Result<u32, DisplacementError> {
    offsets.flat_index(handle).ok_or_else(|| {
        DisplacementError::GridAccess(format!("agent {handle} is outside the population"))
    })
}
