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

//! Host-memory buffers standing in for accelerator-resident storage.

use spheron_core::device::DeviceError;
use spheron_core::kernel::KernelArgs;
use spheron_core::math::Vec3;

use super::kernel;

/// Per-agent and per-box arrays reserved up front and only refilled within
/// their capacity on upload.
#[derive(Debug, Default)]
pub(crate) struct ResidentBuffers {
    object_capacity: usize,
    box_capacity: usize,
    positions: Vec<Vec3>,
    diameters: Vec<f32>,
    tractor_forces: Vec<Vec3>,
    adherence: Vec<f32>,
    box_ids: Vec<u32>,
    masses: Vec<f32>,
    successors: Vec<u32>,
    displacements: Vec<Vec3>,
    box_starts: Vec<u32>,
    box_lengths: Vec<u16>,
}

fn reserve<T>(buffer: &mut Vec<T>, capacity: usize, name: &'static str) -> Result<(), DeviceError> {
    buffer.clear();
    buffer
        .try_reserve_exact(capacity)
        .map_err(|_| DeviceError::AllocationFailed {
            buffer: name,
            requested: capacity,
        })
}

impl ResidentBuffers {
    pub(crate) fn with_capacity(
        object_capacity: usize,
        box_capacity: usize,
    ) -> Result<Self, DeviceError> {
        let mut buffers = Self::default();
        buffers.grow_objects(object_capacity)?;
        buffers.grow_boxes(box_capacity)?;
        Ok(buffers)
    }

    pub(crate) fn object_capacity(&self) -> usize {
        self.object_capacity
    }

    pub(crate) fn box_capacity(&self) -> usize {
        self.box_capacity
    }

    pub(crate) fn grow_objects(&mut self, capacity: usize) -> Result<(), DeviceError> {
        reserve(&mut self.positions, capacity, "positions")?;
        reserve(&mut self.diameters, capacity, "diameters")?;
        reserve(&mut self.tractor_forces, capacity, "tractor forces")?;
        reserve(&mut self.adherence, capacity, "adherence")?;
        reserve(&mut self.box_ids, capacity, "box ids")?;
        reserve(&mut self.masses, capacity, "masses")?;
        reserve(&mut self.successors, capacity, "successors")?;
        reserve(&mut self.displacements, capacity, "displacements")?;
        self.object_capacity = capacity;
        Ok(())
    }

    pub(crate) fn grow_boxes(&mut self, capacity: usize) -> Result<(), DeviceError> {
        reserve(&mut self.box_starts, capacity, "box starts")?;
        reserve(&mut self.box_lengths, capacity, "box lengths")?;
        self.box_capacity = capacity;
        Ok(())
    }

    /// Copies the launch inputs in, runs the kernel on the resident copies
    /// and copies the displacements out.
    pub(crate) fn launch(
        &mut self,
        args: &KernelArgs<'_>,
        out: &mut [Vec3],
    ) -> Result<(), DeviceError> {
        let n = args.num_objects as usize;
        if n > self.object_capacity {
            return Err(DeviceError::CapacityExceeded {
                buffer: "objects",
                required: n,
                capacity: self.object_capacity,
            });
        }
        if args.box_count() > self.box_capacity {
            return Err(DeviceError::CapacityExceeded {
                buffer: "boxes",
                required: args.box_count(),
                capacity: self.box_capacity,
            });
        }
        if out.len() != n {
            return Err(DeviceError::InvalidArguments(format!(
                "{} output slots for {n} agents",
                out.len()
            )));
        }
        args.validate().map_err(DeviceError::InvalidArguments)?;

        upload(&mut self.positions, args.positions);
        upload(&mut self.diameters, args.diameters);
        upload(&mut self.tractor_forces, args.tractor_forces);
        upload(&mut self.adherence, args.adherence);
        upload(&mut self.box_ids, args.box_ids);
        upload(&mut self.masses, args.masses);
        upload(&mut self.successors, args.successors);
        upload(&mut self.box_starts, args.box_starts);
        upload(&mut self.box_lengths, args.box_lengths);
        self.displacements.clear();
        self.displacements.resize(n, Vec3::ZERO);

        let resident = KernelArgs {
            positions: &self.positions,
            diameters: &self.diameters,
            tractor_forces: &self.tractor_forces,
            adherence: &self.adherence,
            box_ids: &self.box_ids,
            masses: &self.masses,
            successors: &self.successors,
            box_starts: &self.box_starts,
            box_lengths: &self.box_lengths,
            ..*args
        };
        kernel::run(&resident, &mut self.displacements)
            .map_err(|err| DeviceError::LaunchFailed(err.to_string()))?;
        out.copy_from_slice(&self.displacements);
        Ok(())
    }
}

fn upload<T: Copy>(resident: &mut Vec<T>, host: &[T]) {
    resident.clear();
    resident.extend_from_slice(host);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_covers_capacity() {
        let buffers = ResidentBuffers::with_capacity(40, 7).unwrap();
        assert_eq!(buffers.object_capacity(), 40);
        assert_eq!(buffers.box_capacity(), 7);
        assert!(buffers.positions.capacity() >= 40);
        assert!(buffers.box_lengths.capacity() >= 7);
    }

    #[test]
    fn test_impossible_reservation_is_allocation_failure() {
        let mut buffers = ResidentBuffers::default();
        let err = buffers.grow_objects(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, DeviceError::AllocationFailed { .. }));
    }
}
