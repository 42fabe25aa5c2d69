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

//! # Agent Model
//!
//! The closed set of agent kinds the simulation can hold, and the opaque
//! handle that addresses them inside the NUMA-partitioned storage.
//!
//! Each kind carries a [`Shape`] tag and an [`AgentCapabilities`] descriptor.
//! Pipelines that only support some kinds (the accelerated displacement step
//! only handles spheres) resolve the descriptor once per agent instead of
//! inspecting runtime types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::math::{Vec3, PI};

/// Opaque address of an agent: the NUMA domain it lives in and its index
/// inside that domain.
///
/// Handles never encode a flat (domain-spanning) index; flat indices are only
/// valid for a single displacement invocation and are derived from a
/// per-invocation offset table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentHandle {
    numa_domain: u16,
    local_index: u32,
}

impl AgentHandle {
    /// Creates a handle from a domain id and a domain-local index.
    #[inline]
    pub const fn new(numa_domain: u16, local_index: u32) -> Self {
        Self {
            numa_domain,
            local_index,
        }
    }

    /// The NUMA domain this agent lives in.
    #[inline]
    pub const fn numa_domain(&self) -> usize {
        self.numa_domain as usize
    }

    /// The agent's index within its NUMA domain.
    #[inline]
    pub const fn local_index(&self) -> usize {
        self.local_index as usize
    }
}

impl fmt::Display for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.numa_domain, self.local_index)
    }
}

/// Geometric shape of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// A sphere described by its diameter.
    Sphere,
    /// A cylinder described by its diameter and length.
    Cylinder,
    /// An axis-aligned box described by its extent.
    Cube,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Sphere => write!(f, "Sphere"),
            Shape::Cylinder => write!(f, "Cylinder"),
            Shape::Cube => write!(f, "Cube"),
        }
    }
}

/// Static description of what an agent kind supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentCapabilities {
    /// Shape tag of the kind.
    pub shape: Shape,
    /// Whether the kind can be displaced by the accelerator kernel.
    pub accelerated_displacement: bool,
}

/// A spherical cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Center of the cell.
    pub position: Vec3,
    /// Diameter of the cell.
    pub diameter: f32,
    /// Minimum force magnitude needed to move the cell.
    pub adherence: f32,
    /// Density used to derive the mass from the volume.
    pub density: f32,
    /// Externally applied force.
    pub tractor_force: Vec3,
    /// Index of the grid box containing the cell, written by the grid.
    pub box_idx: u32,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            diameter: 1.0,
            adherence: 0.0,
            density: 1.0,
            tractor_force: Vec3::ZERO,
            box_idx: 0,
        }
    }
}

impl Cell {
    /// Creates a cell at `position` with the given `diameter` and default
    /// density, adherence, and tractor force.
    pub fn new(position: Vec3, diameter: f32) -> Self {
        Self {
            position,
            diameter,
            ..Default::default()
        }
    }

    /// Sets the adherence threshold.
    pub fn with_adherence(mut self, adherence: f32) -> Self {
        self.adherence = adherence;
        self
    }

    /// Sets the density.
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Sets the tractor force.
    pub fn with_tractor_force(mut self, force: Vec3) -> Self {
        self.tractor_force = force;
        self
    }

    /// Volume of the sphere, `π/6 · d³`.
    pub fn volume(&self) -> f32 {
        PI / 6.0 * self.diameter * self.diameter * self.diameter
    }

    /// Mass derived from density and volume.
    pub fn mass(&self) -> f32 {
        self.density * self.volume()
    }
}

/// A cylindrical neurite segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuriteSegment {
    /// Center of the segment.
    pub position: Vec3,
    /// Diameter of the cylinder.
    pub diameter: f32,
    /// Length of the cylinder axis.
    pub length: f32,
    /// Index of the grid box containing the segment.
    pub box_idx: u32,
}

/// An axis-aligned cuboid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    /// Center of the cuboid.
    pub position: Vec3,
    /// Full edge lengths along each axis.
    pub extent: Vec3,
    /// Index of the grid box containing the cuboid.
    pub box_idx: u32,
}

/// Every kind of agent the simulation can hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Agent {
    /// A spherical cell.
    Cell(Cell),
    /// A cylindrical neurite segment.
    NeuriteSegment(NeuriteSegment),
    /// An axis-aligned cuboid.
    Cuboid(Cuboid),
}

impl Agent {
    /// Shape tag of this agent's kind.
    pub fn shape(&self) -> Shape {
        self.capabilities().shape
    }

    /// Capability descriptor of this agent's kind.
    pub fn capabilities(&self) -> AgentCapabilities {
        match self {
            Agent::Cell(_) => AgentCapabilities {
                shape: Shape::Sphere,
                accelerated_displacement: true,
            },
            Agent::NeuriteSegment(_) => AgentCapabilities {
                shape: Shape::Cylinder,
                accelerated_displacement: false,
            },
            Agent::Cuboid(_) => AgentCapabilities {
                shape: Shape::Cube,
                accelerated_displacement: false,
            },
        }
    }

    /// Returns the cell if this agent is one.
    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Agent::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    /// Center of the agent.
    pub fn position(&self) -> Vec3 {
        match self {
            Agent::Cell(c) => c.position,
            Agent::NeuriteSegment(n) => n.position,
            Agent::Cuboid(b) => b.position,
        }
    }

    /// Moves the agent's center to `position`.
    pub fn set_position(&mut self, position: Vec3) {
        match self {
            Agent::Cell(c) => c.position = position,
            Agent::NeuriteSegment(n) => n.position = position,
            Agent::Cuboid(b) => b.position = position,
        }
    }

    /// Largest extent of the agent, used to size grid boxes.
    pub fn max_extent(&self) -> f32 {
        match self {
            Agent::Cell(c) => c.diameter,
            Agent::NeuriteSegment(n) => n.diameter.max(n.length),
            Agent::Cuboid(b) => b.extent.x.max(b.extent.y).max(b.extent.z),
        }
    }

    /// Index of the grid box containing the agent.
    pub fn box_idx(&self) -> u32 {
        match self {
            Agent::Cell(c) => c.box_idx,
            Agent::NeuriteSegment(n) => n.box_idx,
            Agent::Cuboid(b) => b.box_idx,
        }
    }

    /// Records the grid box containing the agent.
    pub fn set_box_idx(&mut self, box_idx: u32) {
        match self {
            Agent::Cell(c) => c.box_idx = box_idx,
            Agent::NeuriteSegment(n) => n.box_idx = box_idx,
            Agent::Cuboid(b) => b.box_idx = box_idx,
        }
    }

    /// Clamps each coordinate of the position into `[min_bound, max_bound]`.
    pub fn apply_bounding_box(&mut self, min_bound: f32, max_bound: f32) {
        let clamped = self.position().clamp_scalar(min_bound, max_bound);
        self.set_position(clamped);
    }
}

impl From<Cell> for Agent {
    fn from(cell: Cell) -> Self {
        Agent::Cell(cell)
    }
}

impl From<NeuriteSegment> for Agent {
    fn from(segment: NeuriteSegment) -> Self {
        Agent::NeuriteSegment(segment)
    }
}

impl From<Cuboid> for Agent {
    fn from(cuboid: Cuboid) -> Self {
        Agent::Cuboid(cuboid)
    }
}
