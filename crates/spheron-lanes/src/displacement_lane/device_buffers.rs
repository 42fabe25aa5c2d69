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

//! Accelerator-resident buffer lifecycle with amortized growth.

use std::fmt;

use spheron_core::device::{DeviceBackend, DeviceError};
use spheron_core::error::DisplacementError;
use spheron_core::kernel::KernelArgs;
use spheron_core::math::{scaled_capacity, Vec3};

/// Lifecycle of a [`DeviceBuffers`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Nothing is allocated on the device.
    Uninitialized,
    /// Buffers exist with the given capacities.
    Allocated {
        /// Number of agents the object buffers can hold.
        object_capacity: usize,
        /// Number of boxes the box buffers can hold.
        box_capacity: usize,
    },
}

/// Outcome of [`DeviceBuffers::ensure_capacity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapacityChange {
    /// Object capacity after the call.
    pub object_capacity: usize,
    /// Box capacity after the call.
    pub box_capacity: usize,
    /// The buffers were allocated from scratch.
    pub initial_allocation: bool,
    /// The object buffers grew.
    pub objects_grown: bool,
    /// The box buffers grew.
    pub boxes_grown: bool,
}

impl CapacityChange {
    /// Whether any device memory was (re)allocated.
    pub fn reallocated(&self) -> bool {
        self.initial_allocation || self.objects_grown || self.boxes_grown
    }
}

/// Owns a device back-end and the capacities of its resident buffers.
///
/// Capacities never shrink while allocated. [`teardown`](Self::teardown)
/// returns the set to [`BufferState::Uninitialized`].
pub struct DeviceBuffers {
    backend: Box<dyn DeviceBackend>,
    state: BufferState,
    growth_factor: f64,
}

impl DeviceBuffers {
    /// Wraps `backend`. Nothing is allocated until the first
    /// [`ensure_capacity`](Self::ensure_capacity).
    pub fn new(backend: Box<dyn DeviceBackend>, growth_factor: f64) -> Self {
        Self {
            backend,
            state: BufferState::Uninitialized,
            growth_factor: growth_factor.max(1.0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Object capacity, zero while uninitialized.
    pub fn object_capacity(&self) -> usize {
        match self.state {
            BufferState::Allocated {
                object_capacity, ..
            } => object_capacity,
            BufferState::Uninitialized => 0,
        }
    }

    /// Box capacity, zero while uninitialized.
    pub fn box_capacity(&self) -> usize {
        match self.state {
            BufferState::Allocated { box_capacity, .. } => box_capacity,
            BufferState::Uninitialized => 0,
        }
    }

    /// Headroom multiplier applied on allocation and growth.
    pub fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    /// Changes the headroom multiplier for future growth.
    pub fn set_growth_factor(&mut self, growth_factor: f64) {
        self.growth_factor = growth_factor.max(1.0);
    }

    /// The wrapped back-end.
    pub fn backend(&self) -> &dyn DeviceBackend {
        self.backend.as_ref()
    }

    /// Makes sure the buffers hold at least `object_count` agents and
    /// `box_count` boxes.
    ///
    /// The first call allocates `growth_factor` times the counts. Later calls
    /// grow a buffer set only when its count reaches the current capacity.
    pub fn ensure_capacity(
        &mut self,
        object_count: usize,
        box_count: usize,
    ) -> Result<CapacityChange, DisplacementError> {
        match self.state {
            BufferState::Uninitialized => {
                let object_capacity = self.grown(object_count);
                let box_capacity = self.grown(box_count);
                self.backend.allocate(object_capacity, box_capacity)?;
                log::info!(
                    "Allocated {} buffers for {} agents and {} boxes",
                    self.backend.name(),
                    object_capacity,
                    box_capacity
                );
                self.state = BufferState::Allocated {
                    object_capacity,
                    box_capacity,
                };
                Ok(CapacityChange {
                    object_capacity,
                    box_capacity,
                    initial_allocation: true,
                    ..Default::default()
                })
            }
            BufferState::Allocated {
                mut object_capacity,
                mut box_capacity,
            } => {
                let mut change = CapacityChange::default();
                if object_count >= object_capacity {
                    let grown = self.grown(object_count);
                    log::info!(
                        "Growing object buffers from {} to {}",
                        object_capacity,
                        grown
                    );
                    self.backend.resize_object_buffers(grown)?;
                    object_capacity = grown;
                    self.state = BufferState::Allocated {
                        object_capacity,
                        box_capacity,
                    };
                    change.objects_grown = true;
                }
                if box_count >= box_capacity {
                    let grown = self.grown(box_count);
                    log::info!("Growing box buffers from {} to {}", box_capacity, grown);
                    self.backend.resize_box_buffers(grown)?;
                    box_capacity = grown;
                    self.state = BufferState::Allocated {
                        object_capacity,
                        box_capacity,
                    };
                    change.boxes_grown = true;
                }
                change.object_capacity = object_capacity;
                change.box_capacity = box_capacity;
                Ok(change)
            }
        }
    }

    /// Runs the kernel on the back-end. Blocks until `displacements` is
    /// fully written.
    pub fn launch(
        &mut self,
        args: &KernelArgs<'_>,
        displacements: &mut [Vec3],
    ) -> Result<(), DisplacementError> {
        let BufferState::Allocated {
            object_capacity,
            box_capacity,
        } = self.state
        else {
            return Err(DisplacementError::Kernel(DeviceError::NotAllocated));
        };
        let n = args.num_objects as usize;
        if n > object_capacity {
            return Err(DisplacementError::Kernel(DeviceError::CapacityExceeded {
                buffer: "objects",
                required: n,
                capacity: object_capacity,
            }));
        }
        if args.box_count() > box_capacity {
            return Err(DisplacementError::Kernel(DeviceError::CapacityExceeded {
                buffer: "boxes",
                required: args.box_count(),
                capacity: box_capacity,
            }));
        }
        if displacements.len() != n {
            return Err(DisplacementError::Kernel(DeviceError::InvalidArguments(
                format!("{} output slots for {n} agents", displacements.len()),
            )));
        }
        args.validate()
            .map_err(|reason| DisplacementError::Kernel(DeviceError::InvalidArguments(reason)))?;
        self.backend.launch(args, displacements)?;
        Ok(())
    }

    /// Releases all device memory. A later
    /// [`ensure_capacity`](Self::ensure_capacity) allocates from scratch.
    pub fn teardown(&mut self) {
        if let BufferState::Allocated { .. } = self.state {
            self.backend.release();
            self.state = BufferState::Uninitialized;
            log::info!("Released {} buffers", self.backend.name());
        }
    }

    fn grown(&self, count: usize) -> usize {
        scaled_capacity(count, self.growth_factor).max(count + 1)
    }
}

impl Drop for DeviceBuffers {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for DeviceBuffers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffers")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("growth_factor", &self.growth_factor)
            .finish()
    }
}
