//! Navigation tuning (decoupled from the agents that consume it)
//!
//! Every field defaults to the matching value in `constants.rs`. Sections
//! are `#[serde(default)]` so a config file only lists what it changes.

use std::fs;
use std::path::Path;

use bevy::log::{info, warn};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{NavError, Result};
use crate::world::SurfaceLayers;

/// Path to the navigation tuning config
pub const NAV_TUNING_FILE: &str = "config/nav_tuning.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    pub gravity: f32,
    pub gravity_scale: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            gravity_scale: GRAVITY_SCALE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementTuning {
    pub move_speed: f32,
    pub min_target_distance: f32,
    pub falling_control: f32,
    pub direction_change_cooldown: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            move_speed: MOVE_SPEED,
            min_target_distance: MIN_TARGET_DISTANCE,
            falling_control: FALLING_CONTROL,
            direction_change_cooldown: DIRECTION_CHANGE_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpTuning {
    pub jump_force: f32,
    pub safety_factor: f32,
    pub max_jump_distance: f32,
    pub apex_velocity: f32,
    pub max_jump_duration: f32,
}

impl Default for JumpTuning {
    fn default() -> Self {
        Self {
            jump_force: JUMP_FORCE,
            safety_factor: JUMP_SAFETY_FACTOR,
            max_jump_distance: MAX_JUMP_DISTANCE,
            apex_velocity: JUMP_APEX_VELOCITY,
            max_jump_duration: MAX_JUMP_DURATION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbTuning {
    pub climb_speed: f32,
    pub slow_zone: f32,
    pub min_speed_factor: f32,
    pub snap_tolerance: f32,
    pub top_buffer: f32,
    pub gravity_reset_delay: f32,
    pub dismount_speed_factor: f32,
}

impl Default for ClimbTuning {
    fn default() -> Self {
        Self {
            climb_speed: CLIMB_SPEED,
            slow_zone: CLIMB_SLOW_ZONE,
            min_speed_factor: CLIMB_MIN_SPEED_FACTOR,
            snap_tolerance: CLIMB_SNAP_TOLERANCE,
            top_buffer: LADDER_TOP_BUFFER,
            gravity_reset_delay: GRAVITY_RESET_DELAY,
            dismount_speed_factor: DISMOUNT_SPEED_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorTuning {
    /// Ground check point relative to the feet. `None` means unconfigured;
    /// the sensors fall back to the feet and log it.
    pub ground_check_point: Option<[f32; 2]>,
    pub ground_check_radius: f32,
    pub ground_check_depth: f32,
    pub ground_probe_offsets: Vec<f32>,
    pub ground_probe_distance: f32,
    pub obstacle_area_depth: f32,
    pub obstacle_ray_distance: f32,
    pub obstacle_ray_height: f32,
    pub step_clearance: f32,
    pub edge_probe_distance: f32,
    pub edge_probe_depth: f32,
    pub obstacle_probe_heights: Vec<f32>,
    pub edge_scan_start: f32,
    pub edge_scan_end: f32,
    pub edge_scan_step: f32,
    pub target_above_threshold: f32,
    pub jump_to_target_dx: f32,
}

impl Default for SensorTuning {
    fn default() -> Self {
        Self {
            ground_check_point: Some([0.0, 0.0]),
            ground_check_radius: GROUND_CHECK_RADIUS,
            ground_check_depth: GROUND_CHECK_DEPTH,
            ground_probe_offsets: GROUND_PROBE_OFFSETS.to_vec(),
            ground_probe_distance: GROUND_PROBE_DISTANCE,
            obstacle_area_depth: OBSTACLE_AREA_DEPTH,
            obstacle_ray_distance: OBSTACLE_RAY_DISTANCE,
            obstacle_ray_height: OBSTACLE_RAY_HEIGHT,
            step_clearance: STEP_CLEARANCE,
            edge_probe_distance: EDGE_PROBE_DISTANCE,
            edge_probe_depth: EDGE_PROBE_DEPTH,
            obstacle_probe_heights: OBSTACLE_PROBE_HEIGHTS.to_vec(),
            edge_scan_start: EDGE_SCAN_START,
            edge_scan_end: EDGE_SCAN_END,
            edge_scan_step: EDGE_SCAN_STEP,
            target_above_threshold: TARGET_ABOVE_THRESHOLD,
            jump_to_target_dx: JUMP_TO_TARGET_DX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathCostTuning {
    pub jump_down_cost_factor: f32,
    pub climb_up_cost_factor: f32,
    pub climb_threshold_y: f32,
}

impl Default for PathCostTuning {
    fn default() -> Self {
        Self {
            jump_down_cost_factor: JUMP_DOWN_COST_FACTOR,
            climb_up_cost_factor: CLIMB_UP_COST_FACTOR,
            climb_threshold_y: CLIMB_THRESHOLD_Y,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTuning {
    pub sample_step: f32,
    pub line_of_sight_lift: f32,
    pub weight_length: f32,
    pub weight_height: f32,
    pub weight_obstacle: f32,
    pub preference_threshold: f32,
    pub replan_min_delta: f32,
    pub replan_interval: f32,
    pub search_radius: f32,
    pub search_radius_expansion: f32,
    pub max_search_attempts: usize,
    pub waypoint_reach_x: f32,
    pub waypoint_reach_y: f32,
}

impl Default for RouteTuning {
    fn default() -> Self {
        Self {
            sample_step: DIRECT_SAMPLE_STEP,
            line_of_sight_lift: LINE_OF_SIGHT_LIFT,
            weight_length: COST_WEIGHT_LENGTH,
            weight_height: COST_WEIGHT_HEIGHT,
            weight_obstacle: COST_WEIGHT_OBSTACLE,
            preference_threshold: ROUTE_PREFERENCE_THRESHOLD,
            replan_min_delta: REPLAN_MIN_DELTA,
            replan_interval: REPLAN_INTERVAL,
            search_radius: WAYPOINT_SEARCH_RADIUS,
            search_radius_expansion: SEARCH_RADIUS_EXPANSION,
            max_search_attempts: MAX_SEARCH_ATTEMPTS,
            waypoint_reach_x: WAYPOINT_REACH_X,
            waypoint_reach_y: WAYPOINT_REACH_Y,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateTuning {
    pub path_planning_pause: f32,
    pub aggro_range: f32,
    pub aggro_cooldown: f32,
    pub eye_height: f32,
}

impl Default for StateTuning {
    fn default() -> Self {
        Self {
            path_planning_pause: PATH_PLANNING_PAUSE,
            aggro_range: AGGRO_RANGE,
            aggro_cooldown: AGGRO_COOLDOWN,
            eye_height: AGENT_EYE_HEIGHT,
        }
    }
}

/// Complete navigation tuning tree
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavTuning {
    pub physics: PhysicsTuning,
    pub movement: MovementTuning,
    pub jump: JumpTuning,
    pub climb: ClimbTuning,
    pub sensors: SensorTuning,
    pub path_costs: PathCostTuning,
    pub route: RouteTuning,
    pub state: StateTuning,
    pub layers: SurfaceLayers,
}

impl NavTuning {
    /// Load tuning from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<NavTuning> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| NavError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|e| NavError::parse(path.display().to_string(), e))
    }

    /// Load tuning, falling back to defaults (with a warning) on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> NavTuning {
        match Self::load_from_file(path.as_ref()) {
            Ok(tuning) => {
                info!("Loaded navigation tuning from {}", path.as_ref().display());
                tuning
            }
            Err(err) => {
                warn!("{}, using default navigation tuning", err);
                NavTuning::default()
            }
        }
    }
}
