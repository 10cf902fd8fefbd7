//! Tunable constants for ledgewalker
//!
//! Default values for every navigation parameter. `NavTuning` starts from
//! these and config files override them. World units are meters.

use bevy::prelude::*;

// =============================================================================
// AGENT BODY
// =============================================================================

/// Agent collision box (width, height). Position is the bottom-center (feet).
pub const AGENT_SIZE: Vec2 = Vec2::new(0.8, 1.8);
pub const AGENT_EYE_HEIGHT: f32 = 1.5; // Line-of-sight origin above the feet

// =============================================================================
// PHYSICS CONSTANTS
// =============================================================================

pub const GRAVITY: f32 = 9.81;
pub const GRAVITY_SCALE: f32 = 2.5;
pub const FIXED_DT: f32 = 1.0 / 60.0;

// =============================================================================
// MOVEMENT
// =============================================================================

pub const MOVE_SPEED: f32 = 3.0;
pub const MIN_TARGET_DISTANCE: f32 = 0.3; // Stop walking when this close horizontally
pub const FALLING_CONTROL: f32 = 0.8; // Fraction of MOVE_SPEED while airborne
pub const DIRECTION_CHANGE_COOLDOWN: f32 = 0.75; // Seconds between facing flips

// =============================================================================
// JUMPING
// =============================================================================

pub const JUMP_FORCE: f32 = 10.0; // Upward impulse (m/s)
pub const JUMP_SAFETY_FACTOR: f32 = 0.8; // Fraction of theoretical apex we trust
pub const MAX_JUMP_DISTANCE: f32 = 3.0;
pub const JUMP_APEX_VELOCITY: f32 = 0.1; // Below this vertical speed the jump is over
pub const MAX_JUMP_DURATION: f32 = 2.0; // Hard cap so a jump always ends
pub const HEIGHT_EPSILON: f32 = 1e-3; // Float slack for height feasibility checks

// =============================================================================
// CLIMBING
// =============================================================================

pub const CLIMB_SPEED: f32 = 2.0;
pub const CLIMB_SLOW_ZONE: f32 = 0.5; // Start slowing this far below the ladder top
pub const CLIMB_MIN_SPEED_FACTOR: f32 = 0.3;
pub const CLIMB_SNAP_TOLERANCE: f32 = 0.05;
pub const LADDER_TOP_BUFFER: f32 = 0.3; // Hysteresis band around the recorded top
pub const GRAVITY_RESET_DELAY: f32 = 2.0;
pub const DISMOUNT_SPEED_FACTOR: f32 = 0.6;

// =============================================================================
// SENSORS
// =============================================================================

pub const GROUND_CHECK_RADIUS: f32 = 0.35;
pub const GROUND_CHECK_DEPTH: f32 = 0.1;
pub const GROUND_PROBE_OFFSETS: [f32; 3] = [-0.3, 0.0, 0.3];
pub const GROUND_PROBE_DISTANCE: f32 = 0.15;
pub const OBSTACLE_AREA_DEPTH: f32 = 0.3;
pub const OBSTACLE_RAY_DISTANCE: f32 = 1.0;
pub const OBSTACLE_RAY_HEIGHT: f32 = 0.5;
pub const STEP_CLEARANCE: f32 = 0.05; // Area probes start this far above the feet
pub const EDGE_PROBE_DISTANCE: f32 = 0.7; // Forward offset of the edge probe
pub const EDGE_PROBE_DEPTH: f32 = 0.6;
pub const OBSTACLE_PROBE_HEIGHTS: [f32; 5] = [0.5, 1.0, 1.5, 2.0, 2.5];
pub const EDGE_SCAN_START: f32 = 0.5;
pub const EDGE_SCAN_END: f32 = 5.0;
pub const EDGE_SCAN_STEP: f32 = 0.5;
pub const MAX_EDGE_SCAN_SAMPLES: usize = 64; // Caps the scan whatever the step
pub const TARGET_ABOVE_THRESHOLD: f32 = 1.0;
pub const JUMP_TO_TARGET_DX: f32 = 1.5; // Max |dx| for "target above, jump for it"

// =============================================================================
// PATHFINDING COSTS
// =============================================================================

pub const JUMP_DOWN_COST_FACTOR: f32 = 0.5;
pub const CLIMB_UP_COST_FACTOR: f32 = 2.0;
pub const CLIMB_THRESHOLD_Y: f32 = 0.5;

// =============================================================================
// ROUTE ARBITRATION
// =============================================================================

pub const DIRECT_SAMPLE_STEP: f32 = 0.25;
pub const MAX_DIRECT_SAMPLES: usize = 512; // Caps the sampled line whatever the step or distance
pub const LINE_OF_SIGHT_LIFT: f32 = 0.5; // Route lines run this far above the feet
pub const COST_WEIGHT_LENGTH: f32 = 1.0;
pub const COST_WEIGHT_HEIGHT: f32 = 1.5;
pub const COST_WEIGHT_OBSTACLE: f32 = 10.0;
pub const ROUTE_PREFERENCE_THRESHOLD: f32 = 0.8;
pub const REPLAN_MIN_DELTA: f32 = 1.0;
pub const REPLAN_INTERVAL: f32 = 0.5;
pub const WAYPOINT_SEARCH_RADIUS: f32 = 4.0;
pub const SEARCH_RADIUS_EXPANSION: f32 = 3.0;
pub const MAX_SEARCH_ATTEMPTS: usize = 16;
pub const WAYPOINT_REACH_X: f32 = 0.5;
pub const WAYPOINT_REACH_Y: f32 = 1.0;

// =============================================================================
// STATE MACHINE
// =============================================================================

pub const PATH_PLANNING_PAUSE: f32 = 1.0;
pub const AGGRO_RANGE: f32 = 12.0;
pub const AGGRO_COOLDOWN: f32 = 3.0;
