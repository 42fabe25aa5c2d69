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

//! Host-memory implementation of the device contract.
//!
//! `HostDevice` emulates an accelerator: it keeps its own resident copies of
//! the kernel inputs, grows them only when told to, and runs the reference
//! kernel on a rayon pool.

mod buffers;
pub mod kernel;

use spheron_core::device::{DeviceBackend, DeviceError};
use spheron_core::kernel::KernelArgs;
use spheron_core::math::Vec3;

use self::buffers::ResidentBuffers;

/// A device back-end living in host memory.
#[derive(Debug, Default)]
pub struct HostDevice {
    buffers: Option<ResidentBuffers>,
    object_limit: Option<usize>,
}

impl HostDevice {
    /// Creates a device with no allocation limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of agents the device can hold, like a card with
    /// finite memory. Requests above the cap fail with
    /// [`DeviceError::AllocationFailed`].
    pub fn with_object_limit(limit: usize) -> Self {
        Self {
            buffers: None,
            object_limit: Some(limit),
        }
    }

    /// Whether buffers are currently allocated.
    pub fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    /// Object capacity of the resident buffers, zero if unallocated.
    pub fn object_capacity(&self) -> usize {
        self.buffers.as_ref().map_or(0, ResidentBuffers::object_capacity)
    }

    /// Box capacity of the resident buffers, zero if unallocated.
    pub fn box_capacity(&self) -> usize {
        self.buffers.as_ref().map_or(0, ResidentBuffers::box_capacity)
    }

    fn check_limit(&self, requested: usize) -> Result<(), DeviceError> {
        match self.object_limit {
            Some(limit) if requested > limit => Err(DeviceError::AllocationFailed {
                buffer: "objects",
                requested,
            }),
            _ => Ok(()),
        }
    }

    fn resident(&mut self) -> Result<&mut ResidentBuffers, DeviceError> {
        self.buffers.as_mut().ok_or(DeviceError::NotAllocated)
    }
}

impl DeviceBackend for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn allocate(&mut self, object_capacity: usize, box_capacity: usize) -> Result<(), DeviceError> {
        self.check_limit(object_capacity)?;
        self.buffers = Some(ResidentBuffers::with_capacity(object_capacity, box_capacity)?);
        log::debug!("Host device reserved {object_capacity} agent and {box_capacity} box slots");
        Ok(())
    }

    fn resize_object_buffers(&mut self, capacity: usize) -> Result<(), DeviceError> {
        self.check_limit(capacity)?;
        self.resident()?.grow_objects(capacity)
    }

    fn resize_box_buffers(&mut self, capacity: usize) -> Result<(), DeviceError> {
        self.resident()?.grow_boxes(capacity)
    }

    fn launch(&mut self, args: &KernelArgs<'_>, displacements: &mut [Vec3]) -> Result<(), DeviceError> {
        self.resident()?.launch(args, displacements)
    }

    fn release(&mut self) {
        if self.buffers.take().is_some() {
            log::debug!("Host device buffers released");
        }
    }
}
