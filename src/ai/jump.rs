//! Jump controller - feasibility from physics constants and jump execution
//!
//! The physics-derived limits live here so the state machine never
//! recomputes jump formulas itself.

use bevy::log::debug;

use crate::constants::HEIGHT_EPSILON;
use crate::tuning::{JumpTuning, PhysicsTuning};
use crate::world::KinematicBody;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JumpState {
    pub is_jumping: bool,
    /// Agent clock time the current jump started
    pub jump_start: Option<f32>,
}

#[derive(Clone, Debug)]
pub struct JumpController {
    tuning: JumpTuning,
    /// Usable apex height with the safety margin applied (v²/2g × safety)
    max_jump_height: f32,
    /// Time to reach the apex (v/g)
    time_to_peak: f32,
    state: JumpState,
}

impl JumpController {
    pub fn new(tuning: &JumpTuning, physics: &PhysicsTuning) -> Self {
        let g = physics.gravity * physics.gravity_scale;
        let (max_jump_height, time_to_peak) = if g > 0.0 {
            (
                tuning.jump_force * tuning.jump_force / (2.0 * g) * tuning.safety_factor,
                tuning.jump_force / g,
            )
        } else {
            (f32::INFINITY, f32::INFINITY)
        };
        Self {
            tuning: tuning.clone(),
            max_jump_height,
            time_to_peak,
            state: JumpState::default(),
        }
    }

    pub fn max_jump_height(&self) -> f32 {
        self.max_jump_height
    }

    pub fn time_to_peak(&self) -> f32 {
        self.time_to_peak
    }

    pub fn state(&self) -> JumpState {
        self.state
    }

    pub fn is_jumping(&self) -> bool {
        self.state.is_jumping
    }

    /// Can the agent clear an obstacle whose measured height is `obstacle_height`?
    pub fn can_jump_over(&self, obstacle_height: f32) -> bool {
        obstacle_height > 0.0 && obstacle_height <= self.max_jump_height + HEIGHT_EPSILON
    }

    /// Can the agent clear a gap that starts `edge_distance` ahead?
    pub fn can_jump_across(&self, edge_distance: f32) -> bool {
        edge_distance > 0.0 && edge_distance <= self.tuning.max_jump_distance
    }

    /// Single upward impulse
    pub fn begin(&mut self, body: &mut KinematicBody, now: f32) {
        body.velocity.y = self.tuning.jump_force;
        self.state = JumpState {
            is_jumping: true,
            jump_start: Some(now),
        };
        debug!("Jump started at ({:.2}, {:.2})", body.position.x, body.position.y);
    }

    /// Airborne tick: keep the horizontal velocity the state machine asked
    /// for, and hand control back once the apex is reached
    pub fn update(&mut self, body: &mut KinematicBody, move_x: f32, now: f32) {
        if !self.state.is_jumping {
            return;
        }
        body.velocity.x = move_x;

        let elapsed = self.state.jump_start.map_or(0.0, |start| now - start);
        if body.velocity.y < self.tuning.apex_velocity || elapsed > self.tuning.max_jump_duration {
            self.state.is_jumping = false;
            debug!("Jump apex after {:.2}s", elapsed);
        }
    }

    pub fn cancel(&mut self) {
        self.state = JumpState::default();
    }
}
