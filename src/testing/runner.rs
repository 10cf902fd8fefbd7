//! Test execution engine

use std::collections::HashMap;

use bevy::prelude::*;

use crate::ai::{AlwaysAggro, NavState, NeverAggro, SharedTarget};
use crate::simulation::Simulation;

use super::assertions::{AgentState, AssertionError, CapturedEvent, WorldState, check_sequence, check_state};
use super::parser::{AggroDef, FrameInput, TestDefinition};

/// Result of running a test
#[derive(Debug)]
pub enum TestResult {
    Pass { frames: u64 },
    Fail { error: AssertionError },
    Error { message: String },
}

/// Frames to run when nothing in the test asks for more
const DEFAULT_FRAMES: u64 = 60;

/// Run a single test and return the result
pub fn run_test(test: &TestDefinition) -> TestResult {
    let level = match test.setup.level.build() {
        Ok(level) => level,
        Err(e) => {
            return TestResult::Error {
                message: format!("Level '{}': {}", test.setup.level.name, e),
            };
        }
    };

    if test.setup.agents.is_empty() {
        return TestResult::Error {
            message: "No agents in [[setup.agents]]".to_string(),
        };
    }

    let mut sim = Simulation::from_level(level, test.setup.tuning.clone());
    let target = SharedTarget::new(test.setup.target.map(Vec2::from));

    for def in &test.setup.agents {
        let index = sim.spawn(def.id.clone(), Vec2::from(def.position));
        let Some(sim_agent) = sim.agent_mut(index) else {
            continue;
        };
        let agent = &mut sim_agent.agent;
        agent.set_target(target.clone());
        match def.aggro {
            AggroDef::Local => agent.set_aggro_provider(None),
            AggroDef::Always => agent.set_aggro_provider(Some(Box::new(AlwaysAggro))),
            AggroDef::Never => agent.set_aggro_provider(Some(Box::new(NeverAggro))),
        }
        agent.set_facing(def.facing_right);
    }

    // Run until the last assertion or expected event
    let max_frame = test
        .expect
        .state
        .iter()
        .map(|s| s.after_frame)
        .chain(test.expect.sequence.iter().filter_map(|e| e.frame_max))
        .chain(test.setup.frames)
        .max()
        .unwrap_or(DEFAULT_FRAMES);

    let mut state_checks = test.expect.state.clone();
    state_checks.sort_by_key(|s| s.after_frame);
    let mut next_check = 0;

    let mut captured: Vec<CapturedEvent> = Vec::new();
    let mut previous: HashMap<String, NavState> = HashMap::new();
    for sim_agent in sim.agents() {
        let state = sim_agent.agent.current_state();
        captured.push(CapturedEvent::state_entered(0, &sim_agent.name, state));
        previous.insert(sim_agent.name.clone(), state);
    }

    for frame in 1..=max_frame {
        for input in test.input.iter().filter(|i| i.frame == frame) {
            if let Err(message) = apply_input(&mut sim, &target, input) {
                return TestResult::Error { message };
            }
        }

        sim.step();

        for sim_agent in sim.agents() {
            let state = sim_agent.agent.current_state();
            if previous.get(&sim_agent.name) != Some(&state) {
                captured.push(CapturedEvent::state_entered(frame, &sim_agent.name, state));
                previous.insert(sim_agent.name.clone(), state);
            }
        }

        while let Some(assertion) = state_checks.get(next_check) {
            if assertion.after_frame > frame {
                break;
            }
            if let Err(error) = check_state(assertion, &world_state(&sim)) {
                return TestResult::Fail {
                    error: AssertionError {
                        message: format!("[frame {}] {}", frame, error.message),
                        ..error
                    },
                };
            }
            next_check += 1;
        }
    }

    match check_sequence(&test.expect.sequence, &captured) {
        Ok(()) => TestResult::Pass { frames: max_frame },
        Err(error) => TestResult::Fail { error },
    }
}

/// Apply one scripted collaborator call
fn apply_input(sim: &mut Simulation, target: &SharedTarget, input: &FrameInput) -> Result<(), String> {
    if let Some(position) = input.target {
        target.set(Some(Vec2::from(position)));
    }
    if input.clear_target {
        target.set(None);
    }

    let forced: Option<NavState> = input
        .force_state
        .as_deref()
        .map(str::parse::<NavState>)
        .transpose()?;

    let names: Vec<String> = sim.agents().iter().map(|a| a.name.clone()).collect();
    for (index, name) in names.iter().enumerate() {
        if input.agent.as_ref().is_some_and(|wanted| wanted != name) {
            continue;
        }
        let Some(sim_agent) = sim.agent_mut(index) else {
            continue;
        };
        if let Some(duration) = input.pause {
            sim_agent.agent.pause_navigation(duration);
        }
        if let Some(enabled) = input.enabled {
            sim_agent.agent.enable_navigation(enabled, &mut sim_agent.body);
        }
        if let Some(state) = forced {
            sim_agent.agent.force_state(state, &mut sim_agent.body);
        }
    }

    if let Some(wanted) = &input.agent
        && !names.contains(wanted)
    {
        return Err(format!("Input at frame {} names unknown agent '{}'", input.frame, wanted));
    }
    Ok(())
}

/// Snapshot every agent for state assertions
fn world_state(sim: &Simulation) -> WorldState {
    let agents = sim
        .agents()
        .iter()
        .map(|a| {
            let telemetry = a.agent.telemetry();
            (
                a.name.clone(),
                AgentState {
                    x: a.body.position.x,
                    y: a.body.position.y,
                    velocity_x: a.body.velocity.x,
                    velocity_y: a.body.velocity.y,
                    gravity_scale: a.body.gravity_scale,
                    state: telemetry.state,
                    facing_right: telemetry.facing_right,
                    grounded: telemetry.sensors.is_grounded,
                    climbing: telemetry.is_climbing,
                    enabled: telemetry.enabled,
                    paused: telemetry.paused,
                },
            )
        })
        .collect();
    WorldState { agents }
}
