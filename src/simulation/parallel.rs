//! Parallel simulation execution
//!
//! Uses Rayon to tick every agent concurrently. Agents share the level
//! geometry and the waypoint graph read-only; each owns its body.

use std::sync::Arc;

use bevy::log::{info, warn};
use bevy::prelude::*;
use rayon::prelude::*;

use crate::ai::{NavState, NavigationAgent, WaypointGraph};
use crate::constants::FIXED_DT;
use crate::levels::BuiltLevel;
use crate::tuning::NavTuning;
use crate::world::{KinematicBody, LevelGeometry, integrate_body};

/// Initialize the global Rayon pool with the given thread count.
/// Call this once at startup before running simulations (0 = auto-detect).
pub fn init_parallel(threads: usize) {
    if threads == 0 {
        return;
    }
    if let Err(err) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        warn!("Rayon thread pool already initialized: {}", err);
    }
}

/// One simulated enemy
pub struct SimAgent {
    pub name: String,
    pub agent: NavigationAgent,
    pub body: KinematicBody,
}

/// Headless fixed-step world: many agents over one level
pub struct Simulation {
    geometry: LevelGeometry,
    graph: Arc<WaypointGraph>,
    tuning: NavTuning,
    agents: Vec<SimAgent>,
    frame: u64,
    dt: f32,
}

impl Simulation {
    pub fn new(geometry: LevelGeometry, graph: WaypointGraph, tuning: NavTuning) -> Self {
        Self {
            geometry,
            graph: Arc::new(graph),
            tuning,
            agents: Vec::new(),
            frame: 0,
            dt: FIXED_DT,
        }
    }

    pub fn from_level(level: BuiltLevel, tuning: NavTuning) -> Self {
        Self::new(level.geometry, level.graph, tuning)
    }

    /// Spawn an agent with its feet at `position`. Returns its index.
    pub fn spawn(&mut self, name: impl Into<String>, position: Vec2) -> usize {
        let mut body = KinematicBody::at(position);
        body.gravity_scale = self.tuning.physics.gravity_scale;
        self.agents.push(SimAgent {
            name: name.into(),
            agent: NavigationAgent::new(&self.tuning, Arc::clone(&self.graph)),
            body,
        });
        self.agents.len() - 1
    }

    pub fn agents(&self) -> &[SimAgent] {
        &self.agents
    }

    pub fn agent_mut(&mut self, index: usize) -> Option<&mut SimAgent> {
        self.agents.get_mut(index)
    }

    pub fn find(&self, name: &str) -> Option<&SimAgent> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn geometry(&self) -> &LevelGeometry {
        &self.geometry
    }

    pub fn graph(&self) -> &Arc<WaypointGraph> {
        &self.graph
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> f32 {
        self.frame as f32 * self.dt
    }

    /// Advance every agent one fixed tick: navigation, then integration
    pub fn step(&mut self) {
        let geometry = &self.geometry;
        let solid = self.tuning.layers.solid();
        let gravity = self.tuning.physics.gravity;
        let dt = self.dt;

        self.agents.par_iter_mut().for_each(|sim| {
            sim.agent.update(dt, geometry, &mut sim.body);
            integrate_body(&mut sim.body, geometry, solid, gravity, dt);
        });
        self.frame += 1;
    }

    pub fn run(&mut self, frames: u64) {
        for _ in 0..frames {
            self.step();
        }
        info!(
            "Simulated {} frames ({:.2}s) for {} agents",
            frames,
            frames as f32 * self.dt,
            self.agents.len()
        );
    }

    /// Current state of every agent, in spawn order
    pub fn states(&self) -> Vec<NavState> {
        self.agents.iter().map(|a| a.agent.current_state()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AlwaysAggro, WaypointGraphBuilder, WaypointType};
    use crate::world::LayerMask;

    fn corridor() -> Simulation {
        let mut geometry = LevelGeometry::new();
        geometry.add_solid(Vec2::new(-30.0, -1.0), Vec2::new(30.0, 0.0), LayerMask::GROUND);
        let mut builder = WaypointGraphBuilder::new();
        builder.add_waypoint(Vec2::new(-10.0, 0.0), WaypointType::Standard);
        builder.add_waypoint(Vec2::new(10.0, 0.0), WaypointType::Standard);
        Simulation::new(geometry, builder.build(), NavTuning::default())
    }

    #[test]
    fn test_agents_converge_on_shared_target() {
        let mut sim = corridor();
        for (i, x) in [-8.0, -4.0, 4.0, 8.0].into_iter().enumerate() {
            let index = sim.spawn(format!("enemy_{}", i), Vec2::new(x, 0.0));
            let agent = &mut sim.agent_mut(index).unwrap().agent;
            agent.set_target(Vec2::ZERO);
            agent.set_aggro_provider(Some(Box::new(AlwaysAggro)));
        }

        sim.run(240);
        assert_eq!(sim.frame(), 240);
        for sim_agent in sim.agents() {
            assert!(sim_agent.body.position.x.abs() < 0.5, "{} at {}", sim_agent.name, sim_agent.body.position.x);
            assert_eq!(sim_agent.body.position.y, 0.0);
        }
        assert!(sim.states().iter().all(|s| *s == NavState::Walking));
    }

    #[test]
    fn test_init_parallel_repeated_only_warns() {
        // The global pool may already exist; later calls are ignored
        init_parallel(2);
        init_parallel(2);
        init_parallel(0);

        let mut sim = corridor();
        let index = sim.spawn("enemy", Vec2::new(-2.0, 0.0));
        let agent = &mut sim.agent_mut(index).unwrap().agent;
        agent.set_target(Vec2::new(2.0, 0.0));
        agent.set_aggro_provider(Some(Box::new(AlwaysAggro)));
        sim.run(30);
        assert!(sim.find("enemy").unwrap().body.position.x > -2.0);
    }

    #[test]
    fn test_agents_share_graph() {
        let mut sim = corridor();
        sim.spawn("a", Vec2::ZERO);
        sim.spawn("b", Vec2::ONE);
        assert_eq!(Arc::strong_count(sim.graph()), 3);
        assert!(sim.find("b").is_some());
        assert!(sim.find("c").is_none());
    }

    #[test]
    fn test_without_target_agents_idle_and_settle() {
        let mut sim = corridor();
        sim.spawn("idle", Vec2::new(0.0, 2.0));
        sim.run(120);
        let idle = sim.find("idle").unwrap();
        assert_eq!(idle.agent.current_state(), NavState::Idle);
        assert_eq!(idle.body.position.y, 0.0);
    }
}
