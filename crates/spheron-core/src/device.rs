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

//! # Accelerator Device Abstraction
//!
//! Interface contract for the hardware (or emulation) that owns the
//! accelerator-resident buffers and runs the displacement kernel.
//!
//! A back-end goes through a simple lifecycle:
//!
//! ```text
//! allocate(objects, boxes) → [ resize_*(..) | launch(..) ]* → release()
//! ```
//!
//! Capacity bookkeeping (how much to allocate and when to grow) is not the
//! back-end's concern; it is driven by the device buffer manager that owns it.

use std::fmt;

use crate::kernel::KernelArgs;
use crate::math::Vec3;

/// An error raised by an accelerator back-end.
#[derive(Debug)]
pub enum DeviceError {
    /// A buffer could not be (re)allocated to the requested element count.
    AllocationFailed {
        /// Which buffer set failed.
        buffer: &'static str,
        /// Requested capacity in elements.
        requested: usize,
    },
    /// A kernel launch or resize was attempted before `allocate`.
    NotAllocated,
    /// The launch arguments do not fit into the resident buffers.
    CapacityExceeded {
        /// Which buffer set is too small.
        buffer: &'static str,
        /// Number of elements the launch needs.
        required: usize,
        /// Number of elements currently allocated.
        capacity: usize,
    },
    /// The launch arguments are internally inconsistent.
    InvalidArguments(String),
    /// The kernel itself failed.
    LaunchFailed(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::AllocationFailed { buffer, requested } => {
                write!(f, "could not allocate {buffer} buffers for {requested} elements")
            }
            DeviceError::NotAllocated => write!(f, "device buffers are not allocated"),
            DeviceError::CapacityExceeded {
                buffer,
                required,
                capacity,
            } => write!(
                f,
                "{buffer} buffers hold {capacity} elements but {required} are required"
            ),
            DeviceError::InvalidArguments(msg) => write!(f, "invalid kernel arguments: {msg}"),
            DeviceError::LaunchFailed(msg) => write!(f, "kernel launch failed: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Interface contract for any accelerator back-end.
pub trait DeviceBackend: Send {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Allocates object buffers for `object_capacity` agents and box buffers
    /// for `box_capacity` grid boxes. Called once, on first use.
    fn allocate(&mut self, object_capacity: usize, box_capacity: usize) -> Result<(), DeviceError>;

    /// Replaces the per-agent buffers with ones holding `capacity` agents.
    fn resize_object_buffers(&mut self, capacity: usize) -> Result<(), DeviceError>;

    /// Replaces the per-box buffers with ones holding `capacity` boxes.
    fn resize_box_buffers(&mut self, capacity: usize) -> Result<(), DeviceError>;

    /// Uploads `args`, runs the displacement kernel, and blocks until every
    /// per-agent displacement has been written to `displacements`.
    fn launch(&mut self, args: &KernelArgs<'_>, displacements: &mut [Vec3])
        -> Result<(), DeviceError>;

    /// Frees all resident buffers.
    fn release(&mut self);
}
