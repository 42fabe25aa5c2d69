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

//! # Kernel Invocation Contract
//!
//! The fixed argument layout handed to the displacement kernel. Every array
//! is indexed by flat index (per-agent arrays) or by box id (per-box arrays).
//! Vector arrays are `[Vec3]`, which is bit-identical to a flat `3 × N`
//! float array.
//!
//! The kernel returns a per-agent *displacement*, not an absolute position.

use crate::math::Vec3;

/// Successor value stored when an agent is the last one in its box.
pub const NO_SUCCESSOR: u32 = u32::MAX;

/// Box start value stored for an empty box.
pub const EMPTY_BOX: u32 = u32::MAX;

/// All inputs of one kernel invocation, borrowed from the host-side buffers.
#[derive(Debug, Clone, Copy)]
pub struct KernelArgs<'a> {
    /// Agent centers.
    pub positions: &'a [Vec3],
    /// Agent diameters.
    pub diameters: &'a [f32],
    /// Externally applied forces.
    pub tractor_forces: &'a [Vec3],
    /// Adherence thresholds.
    pub adherence: &'a [f32],
    /// Grid box of every agent.
    pub box_ids: &'a [u32],
    /// Agent masses.
    pub masses: &'a [f32],
    /// Simulation time step.
    pub time_step: f32,
    /// Upper bound on the length of one displacement.
    pub max_displacement: f32,
    /// Squared interaction radius (largest object size squared).
    pub squared_radius: f32,
    /// Number of agents, `N`.
    pub num_objects: u32,
    /// Flat index of the first agent of each box, or [`EMPTY_BOX`].
    pub box_starts: &'a [u32],
    /// Number of agents in each box.
    pub box_lengths: &'a [u16],
    /// Flat index of the next agent in the same box, or [`NO_SUCCESSOR`].
    pub successors: &'a [u32],
    /// Edge length of a grid box.
    pub box_length: u32,
    /// Number of boxes along each axis.
    pub num_boxes_axis: [u32; 3],
    /// Integral lower corner of the grid.
    pub grid_dimensions: [i32; 3],
}

impl KernelArgs<'_> {
    /// Number of grid boxes described by the per-box arrays.
    pub fn box_count(&self) -> usize {
        self.box_starts.len()
    }

    /// Checks that every per-agent array has `num_objects` elements and both
    /// per-box arrays agree in length.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.num_objects as usize;
        let per_agent = [
            ("positions", self.positions.len()),
            ("diameters", self.diameters.len()),
            ("tractor_forces", self.tractor_forces.len()),
            ("adherence", self.adherence.len()),
            ("box_ids", self.box_ids.len()),
            ("masses", self.masses.len()),
            ("successors", self.successors.len()),
        ];
        for (name, len) in per_agent {
            if len != n {
                return Err(format!("`{name}` has {len} elements, expected {n}"));
            }
        }
        if self.box_starts.len() != self.box_lengths.len() {
            return Err(format!(
                "{} box starts but {} box lengths",
                self.box_starts.len(),
                self.box_lengths.len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_detects_length_mismatch() {
        let positions = [Vec3::ZERO; 2];
        let scalars = [1.0f32; 2];
        let ids = [0u32; 2];
        let short = [0u32; 1];
        let args = KernelArgs {
            positions: &positions,
            diameters: &scalars,
            tractor_forces: &positions,
            adherence: &scalars,
            box_ids: &ids,
            masses: &scalars,
            time_step: 0.01,
            max_displacement: 3.0,
            squared_radius: 1.0,
            num_objects: 2,
            box_starts: &[0],
            box_lengths: &[2],
            successors: &short,
            box_length: 1,
            num_boxes_axis: [1, 1, 1],
            grid_dimensions: [0, 0, 0],
        };
        let err = args.validate().unwrap_err();
        assert!(err.contains("successors"));

        let args = KernelArgs {
            successors: &ids,
            ..args
        };
        assert!(args.validate().is_ok());
        assert_eq!(args.box_count(), 1);
    }
}
