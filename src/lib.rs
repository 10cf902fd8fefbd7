//! Ledgewalker - enemy navigation for 2D side-scrolling levels
//!
//! This crate provides the waypoint graph, route arbitration, sensors, jump
//! and climb controllers and the navigation state machine, plus a headless
//! simulation and a Bevy plugin to drive them.

// Core modules
pub mod constants;
pub mod error;
pub mod helpers;
pub mod simulation;
pub mod testing;
pub mod tuning;

// Navigation modules
pub mod ai;
pub mod levels;
pub mod plugin;
pub mod world;

// Re-export commonly used types for convenience
pub use ai::{
    AggroProvider, AlwaysAggro, AnimationParams, ClimbController, ClimbPurpose, DelayTimer,
    EnvironmentSensors, JumpController, LocalAggro, NavState, NavigationAgent,
    NavigationTelemetry, NeverAggro, PathResult, RouteArbiter, RouteChoice, RouteDecision,
    SensorSnapshot, SharedTarget, TargetProvider, TimerHandle, Waypoint, WaypointGraph,
    WaypointGraphBuilder, WaypointId, WaypointType, find_path,
};
pub use constants::*;
pub use error::{NavError, Result};
pub use helpers::*;
pub use levels::{BuiltLevel, LevelDef};
pub use plugin::{NavigationPlugin, navigation_tick};
pub use simulation::{SimAgent, Simulation};
pub use tuning::{NAV_TUNING_FILE, NavTuning};
pub use world::{
    Aabb, ColliderId, KinematicBody, LayerMask, LevelGeometry, ProbeHit, SpatialQuery,
    SurfaceLayers, integrate_body,
};
