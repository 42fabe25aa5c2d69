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

//! Reference force kernel.
//!
//! Each agent starts from its tractor displacement, accumulates a
//! soft-sphere collision force from every neighbour in the surrounding
//! 3x3x3 block of boxes, and moves only when that force exceeds its
//! adherence.

use rayon::prelude::*;
use spheron_core::kernel::KernelArgs;
use spheron_core::math::Vec3;
use thiserror::Error;

/// Added to both radii before testing for overlap.
pub const INTERACTION_MARGIN: f32 = 1.5;
const STIFFNESS: f32 = 2.0;
const DAMPING: f32 = 1.0;
/// Push applied on every axis when two centers coincide.
pub const COINCIDENT_PUSH: f32 = 42.0;
const MIN_DISTANCE: f32 = 1e-8;

/// Inconsistent kernel input detected while traversing the grid.
#[derive(Debug, Error, PartialEq)]
pub enum KernelError {
    /// Box arrays disagree with the advertised boxes per axis.
    #[error("grid of {expected} boxes described by {actual} box entries")]
    GridMismatch {
        /// Product of boxes per axis.
        expected: usize,
        /// Length of the box arrays.
        actual: usize,
    },
    /// Boxes per axis multiply past the addressable range.
    #[error("grid of {num_boxes_axis:?} boxes overflows the box count")]
    GridOverflow {
        /// Boxes per axis as advertised.
        num_boxes_axis: [u32; 3],
    },
    /// An agent refers to a box that does not exist.
    #[error("agent {agent} lies in box {box_id} but the grid has {box_count} boxes")]
    BoxOutOfRange {
        /// Flat index of the agent.
        agent: usize,
        /// Offending box id.
        box_id: u32,
        /// Number of boxes.
        box_count: usize,
    },
    /// A colliding agent has no positive mass to divide its force by.
    #[error("agent {agent} has non-positive mass {mass}")]
    NonPositiveMass {
        /// Flat index of the agent.
        agent: usize,
        /// Offending mass.
        mass: f32,
    },
    /// A box chain is shorter than its length or leaves the population.
    #[error("box {box_id} links to agent {index} outside [0, {num_objects})")]
    BrokenChain {
        /// Box being traversed.
        box_id: usize,
        /// Offending flat index.
        index: u32,
        /// Number of agents.
        num_objects: usize,
    },
}

/// Computes one displacement per agent into `out`.
pub fn run(args: &KernelArgs<'_>, out: &mut [Vec3]) -> Result<(), KernelError> {
    let expected = args
        .num_boxes_axis
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n as usize))
        .ok_or(KernelError::GridOverflow {
            num_boxes_axis: args.num_boxes_axis,
        })?;
    if expected != args.box_count() {
        return Err(KernelError::GridMismatch {
            expected,
            actual: args.box_count(),
        });
    }
    out.par_iter_mut().enumerate().try_for_each(|(i, slot)| {
        *slot = displacement_of(args, i)?;
        Ok(())
    })
}

fn displacement_of(args: &KernelArgs<'_>, i: usize) -> Result<Vec3, KernelError> {
    let n = args.num_objects as usize;
    let time_step = args.time_step;
    let mut displacement = args.tractor_forces[i] * time_step;

    let box_id = args.box_ids[i];
    if box_id as usize >= args.box_count() {
        return Err(KernelError::BoxOutOfRange {
            agent: i,
            box_id,
            box_count: args.box_count(),
        });
    }
    let [nx, ny, nz] = args.num_boxes_axis.map(i64::from);
    let id = i64::from(box_id);
    let (bx, by, bz) = (id % nx, (id / nx) % ny, id / (nx * ny));

    let position = args.positions[i];
    let radius = args.diameters[i] * 0.5;
    let mut collision = Vec3::ZERO;

    for z in bz - 1..=bz + 1 {
        for y in by - 1..=by + 1 {
            for x in bx - 1..=bx + 1 {
                if x < 0 || y < 0 || z < 0 || x >= nx || y >= ny || z >= nz {
                    continue;
                }
                let neighbor_box = (z * nx * ny + y * nx + x) as usize;
                let mut next = args.box_starts[neighbor_box];
                for _ in 0..args.box_lengths[neighbor_box] {
                    let j = next as usize;
                    if j >= n {
                        return Err(KernelError::BrokenChain {
                            box_id: neighbor_box,
                            index: next,
                            num_objects: n,
                        });
                    }
                    if j != i {
                        let other = args.positions[j];
                        if position.distance_squared(other) < args.squared_radius {
                            collision += pair_force(position, radius, other, args.diameters[j] * 0.5);
                        }
                    }
                    next = args.successors[j];
                }
            }
        }
    }

    if collision.length() > args.adherence[i] {
        let mass = args.masses[i];
        if mass.is_nan() || mass <= 0.0 {
            return Err(KernelError::NonPositiveMass { agent: i, mass });
        }
        displacement += collision * (time_step / mass);
        let length = displacement.length();
        if length > args.max_displacement {
            displacement = displacement * (args.max_displacement / length);
        }
    }
    Ok(displacement)
}

/// Soft-sphere force exerted on the sphere at `p1` by the sphere at `p2`.
pub fn pair_force(p1: Vec3, r1: f32, p2: Vec3, r2: f32) -> Vec3 {
    let r1 = r1 + INTERACTION_MARGIN;
    let r2 = r2 + INTERACTION_MARGIN;
    let offset = p1 - p2;
    let distance = offset.length();
    let delta = r1 + r2 - distance;
    if delta < 0.0 {
        return Vec3::ZERO;
    }
    if distance < MIN_DISTANCE {
        return Vec3::new(COINCIDENT_PUSH, COINCIDENT_PUSH, COINCIDENT_PUSH);
    }
    let r = r1 * r2 / (r1 + r2);
    let magnitude = STIFFNESS * delta - DAMPING * (r * delta).sqrt();
    offset * (magnitude / distance)
}
