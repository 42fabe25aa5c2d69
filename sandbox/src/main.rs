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

// Runs the displacement step over a cubic lattice of cells.
// Run with: cargo run -p sandbox -- --steps 20 --side 12

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spheron_agents::Simulation;
use spheron_core::agent::Cell;
use spheron_core::config::SpheronConfig;
use spheron_core::math::Vec3;
use spheron_data::AgentStore;

#[derive(Parser, Debug)]
#[command(name = "sandbox", version)]
#[command(about = "Run displacement steps over a lattice of cells")]
struct Args {
    /// TOML configuration file; defaults are used when it does not exist
    #[arg(long, default_value = "spheron.toml")]
    config: PathBuf,

    /// Number of steps to run
    #[arg(long, default_value_t = 10)]
    steps: usize,

    /// Cells per lattice edge
    #[arg(long, default_value_t = 10)]
    side: usize,

    /// Distance between neighbouring cells
    #[arg(long, default_value_t = 0.9)]
    spacing: f32,

    /// Cell diameter
    #[arg(long, default_value_t = 1.0)]
    diameter: f32,

    /// Number of NUMA domains to spread the cells over
    #[arg(long, default_value_t = 2)]
    domains: usize,

    /// Clamp cells into the configured bounds
    #[arg(long)]
    bound: bool,
}

fn lattice(args: &Args) -> AgentStore {
    let mut store = AgentStore::new(args.domains);
    for x in 0..args.side {
        for y in 0..args.side {
            for z in 0..args.side {
                let position = Vec3::new(x as f32, y as f32, z as f32) * args.spacing;
                store.push_balanced(Cell::new(position, args.diameter));
            }
        }
    }
    store
}

fn extent(store: &AgentStore) -> (Vec3, Vec3) {
    store.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(lo, hi), (_, agent)| (lo.min(agent.position()), hi.max(agent.position())),
    )
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = SpheronConfig::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    if args.bound {
        config.simulation.bound_space = true;
    }

    let store = lattice(&args);
    log::info!(
        "Lattice of {} cells over {} NUMA domains",
        args.side.pow(3),
        args.domains.max(1)
    );
    let (lo, hi) = extent(&store);
    log::info!("Initial extent {:?} .. {:?}", lo, hi);

    let mut sim = Simulation::with_host_device(store, &config)?;
    for _ in 0..args.steps {
        sim.step()?;
        if let Some(report) = sim.displacement().last_report() {
            log::info!(
                "Step {}: {} agents in {} boxes, {:.2?}",
                sim.displacement().steps_completed(),
                report.agent_count,
                report.box_count,
                report.elapsed
            );
        }
    }

    let (lo, hi) = extent(sim.store());
    log::info!("Final extent {:?} .. {:?}", lo, hi);
    sim.teardown();
    Ok(())
}
