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

use approx::assert_relative_eq;
use spheron_agents::{DisplacementAgent, Simulation};
use spheron_core::agent::{Cell, Cuboid};
use spheron_core::config::{DisplacementConfig, SimulationParams, SpheronConfig};
use spheron_core::error::DisplacementError;
use spheron_core::math::Vec3;
use spheron_core::storage::AgentStorage;
use spheron_data::{AgentStore, UniformGrid};
use spheron_lanes::displacement_lane::BufferState;

fn pair_store() -> AgentStore {
    let mut store = AgentStore::new(2);
    store.push(0, Cell::new(Vec3::new(3.0, 3.0, 3.0), 1.0));
    store.push(1, Cell::new(Vec3::new(3.5, 3.0, 3.0), 1.0));
    store
}

#[test]
fn test_simulation_step_separates_overlapping_cells() {
    let mut sim = Simulation::with_host_device(pair_store(), &SpheronConfig::default()).unwrap();
    sim.run(3).unwrap();

    let xs: Vec<f32> = sim.store().iter().map(|(_, a)| a.position().x).collect();
    assert!(xs[0] < 3.0);
    assert!(xs[1] > 3.5);
    assert_relative_eq!(3.0 - xs[0], xs[1] - 3.5, epsilon = 1e-4);

    let agent = sim.displacement();
    assert_eq!(agent.steps_completed(), 3);
    assert_eq!(agent.last_report().unwrap().agent_count, 2);
    assert_eq!(agent.select_lane().strategy_name(), "AcceleratedDisplacement");
}

#[test]
fn test_shape_violation_is_fatal_and_leaves_positions() {
    let mut store = pair_store();
    store.push(
        1,
        Cuboid {
            position: Vec3::new(3.2, 3.0, 3.0),
            extent: Vec3::ONE,
            box_idx: 0,
        },
    );
    let before: Vec<Vec3> = store.iter().map(|(_, a)| a.position()).collect();
    let mut sim = Simulation::with_host_device(store, &SpheronConfig::default()).unwrap();

    let err = sim.step().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DisplacementError>(),
        Some(DisplacementError::ShapeViolation { .. })
    ));
    assert!(sim.has_failed());
    let after: Vec<Vec3> = sim.store().iter().map(|(_, a)| a.position()).collect();
    assert_eq!(before, after);
    assert_eq!(sim.displacement().buffers().state(), BufferState::Uninitialized);

    assert!(sim.step().is_err());
    assert_eq!(sim.displacement().steps_completed(), 0);
}

#[test]
fn test_population_growth_grows_buffers_once() {
    let config = SpheronConfig::default();
    let mut sim = Simulation::with_host_device(pair_store(), &config).unwrap();
    sim.step().unwrap();
    let first = *sim.displacement().last_report().unwrap();
    assert!(first.capacity.initial_allocation);
    assert_eq!(first.capacity.object_capacity, 3);

    for i in 0..10 {
        sim.store_mut()
            .push_balanced(Cell::new(Vec3::new(10.0 + 3.0 * i as f32, 0.0, 0.0), 1.0));
    }
    sim.step().unwrap();
    let grown = *sim.displacement().last_report().unwrap();
    assert!(grown.capacity.objects_grown);
    assert_eq!(grown.capacity.object_capacity, 15);

    sim.step().unwrap();
    let steady = *sim.displacement().last_report().unwrap();
    assert!(!steady.capacity.objects_grown);
    assert_eq!(steady.capacity.object_capacity, 15);
}

#[test]
fn test_teardown_then_step_reallocates() {
    let mut sim = Simulation::with_host_device(pair_store(), &SpheronConfig::default()).unwrap();
    sim.step().unwrap();
    sim.teardown();
    assert_eq!(sim.displacement().buffers().state(), BufferState::Uninitialized);

    sim.step().unwrap();
    assert!(sim.displacement().last_report().unwrap().capacity.initial_allocation);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = SpheronConfig {
        displacement: DisplacementConfig {
            growth_factor: 0.5,
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(Simulation::with_host_device(pair_store(), &config).is_err());
}

#[test]
fn test_bounded_simulation_clamps() {
    let mut store = AgentStore::new(1);
    store.push(
        0,
        Cell::new(Vec3::new(0.9, 0.5, 0.5), 1.0).with_tractor_force(Vec3::new(100.0, 0.0, 0.0)),
    );
    let mut sim = Simulation::with_host_device(store, &SpheronConfig::default()).unwrap();
    sim.set_params(SimulationParams {
        bound_space: true,
        min_bound: 0.0,
        max_bound: 1.0,
        ..Default::default()
    })
    .unwrap();
    sim.step().unwrap();
    let (_, cell) = sim.store().iter().next().unwrap();
    assert_eq!(cell.position(), Vec3::new(1.0, 0.5, 0.5));
}

#[test]
fn test_invalid_params_are_rejected_and_previous_kept() {
    let mut sim = Simulation::with_host_device(pair_store(), &SpheronConfig::default()).unwrap();
    let before = *sim.params();

    let inverted = SimulationParams {
        bound_space: true,
        min_bound: 5.0,
        max_bound: 1.0,
        ..Default::default()
    };
    assert!(sim.set_params(inverted).is_err());
    let frozen = SimulationParams {
        time_step: 0.0,
        ..Default::default()
    };
    assert!(sim.set_params(frozen).is_err());

    assert_eq!(*sim.params(), before);
    sim.step().unwrap();
}

#[test]
fn test_agent_drives_external_grid_and_store() {
    let mut store = pair_store();
    let mut grid = UniformGrid::new();
    grid.update(&mut store).unwrap();
    let mut agent = DisplacementAgent::with_host_device(DisplacementConfig {
        chunk_size: 1,
        growth_factor: 2.0,
    });

    let report = agent
        .execute(&mut store, &grid, &SimulationParams::default())
        .unwrap();
    assert_eq!(report.capacity.object_capacity, 4);
    assert_eq!(store.total_agent_count(), 2);
    assert_eq!(agent.config().chunk_size, 1);
}
