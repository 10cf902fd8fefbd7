//! Navigation state machine - per-agent orchestration
//!
//! Each tick: timers, target, route arbitration, sensors, aggro, then one
//! pass through the transition table and the per-state motion. The caller
//! integrates the body afterwards.

use std::sync::Arc;

use bevy::log::{debug, info};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ai::climb::{ClimbController, ClimbPurpose};
use crate::ai::jump::JumpController;
use crate::ai::navigation::WaypointGraph;
use crate::ai::providers::{AggroProvider, LocalAggro, TargetProvider};
use crate::ai::route::{ActiveRoute, RouteArbiter, RouteChoice};
use crate::ai::schedule::{DelayTimer, TimerHandle};
use crate::ai::sensors::{EnvironmentSensors, SensorSnapshot};
use crate::helpers::facing_sign;
use crate::tuning::NavTuning;
use crate::world::{ColliderId, KinematicBody, SpatialQuery};

/// Locomotion state. Exactly one at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavState {
    #[default]
    Idle,
    Walking,
    Jumping,
    Climbing,
    Falling,
    /// Blocked with no jump or climb: pause, flip facing, walk again
    PathPlanning,
}

impl std::fmt::Display for NavState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::str::FromStr for NavState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Idle" => Ok(NavState::Idle),
            "Walking" => Ok(NavState::Walking),
            "Jumping" => Ok(NavState::Jumping),
            "Climbing" => Ok(NavState::Climbing),
            "Falling" => Ok(NavState::Falling),
            "PathPlanning" => Ok(NavState::PathPlanning),
            other => Err(format!("unknown navigation state '{}'", other)),
        }
    }
}

/// Guard inputs for one pass through the transition table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Guards {
    pub is_aggro: bool,
    pub is_grounded: bool,
    /// Obstacle ahead while heading toward the steering point
    pub is_blocked: bool,
    pub is_ladder_detected: bool,
    pub is_jumping: bool,
    pub is_climbing: bool,
    pub should_jump: bool,
    pub should_climb: bool,
    /// The climb controller's latched purpose still wants to climb
    pub climb_wanted: bool,
}

/// The transition table. PathPlanning is left only by its own timer.
pub fn decide_transition(state: NavState, g: &Guards) -> NavState {
    use NavState::*;

    if state == PathPlanning {
        return PathPlanning;
    }
    if !g.is_aggro {
        return Idle;
    }

    match state {
        Idle => Walking,
        Walking => {
            if g.should_jump {
                Jumping
            } else if g.should_climb {
                Climbing
            } else if !g.is_grounded {
                Falling
            } else if g.is_blocked {
                PathPlanning
            } else {
                Walking
            }
        }
        Jumping => match (g.is_jumping, g.is_grounded) {
            (true, _) => Jumping,
            (false, true) => Walking,
            (false, false) => Falling,
        },
        Climbing => {
            if !g.is_climbing || !g.is_ladder_detected || !g.climb_wanted {
                Walking
            } else {
                Climbing
            }
        }
        Falling => {
            if g.is_grounded {
                Walking
            } else if g.should_climb {
                Climbing
            } else {
                Falling
            }
        }
        PathPlanning => PathPlanning,
    }
}

/// Per-tick flags for an animation collaborator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationParams {
    pub walking: bool,
    pub jumping: bool,
    pub falling: bool,
    pub climbing: bool,
    pub grounded: bool,
}

/// Read-only view of an agent for debug and UI collaborators
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NavigationTelemetry {
    pub state: NavState,
    pub facing_right: bool,
    pub enabled: bool,
    pub paused: bool,
    /// Seconds left on an external pause
    pub pause_remaining: Option<f32>,
    pub sensors: SensorSnapshot,
    pub route_choice: RouteChoice,
    pub direct_cost: f32,
    pub alternate_cost: Option<f32>,
    pub steering: Option<Vec2>,
    pub route_remaining: usize,
    pub is_jumping: bool,
    pub is_climbing: bool,
    pub is_at_ladder_top: bool,
    pub last_ladder_top_y: Option<f32>,
    pub gravity_reset_pending: bool,
    pub last_direction_change: Option<f32>,
    pub clock: f32,
}

/// Per-enemy navigation state
#[derive(Component)]
pub struct NavigationAgent {
    tuning: NavTuning,
    sensors: EnvironmentSensors,
    jump: JumpController,
    climb: ClimbController,
    arbiter: RouteArbiter,
    route: ActiveRoute,
    target: Option<Box<dyn TargetProvider>>,
    aggro: Option<Box<dyn AggroProvider>>,
    local_aggro: LocalAggro,
    state: NavState,
    snapshot: SensorSnapshot,
    facing_right: bool,
    enabled: bool,
    clock: f32,
    last_direction_change: Option<f32>,
    pause: DelayTimer,
    planning: DelayTimer,
    steering: Option<Vec2>,
    animation: AnimationParams,
}

impl NavigationAgent {
    pub fn new(tuning: &NavTuning, graph: Arc<WaypointGraph>) -> Self {
        Self {
            tuning: tuning.clone(),
            sensors: EnvironmentSensors::new(&tuning.sensors, tuning.layers),
            jump: JumpController::new(&tuning.jump, &tuning.physics),
            climb: ClimbController::new(&tuning.climb),
            arbiter: RouteArbiter::new(graph, &tuning.route, &tuning.path_costs, tuning.layers.obstacle),
            route: ActiveRoute::default(),
            target: None,
            aggro: None,
            local_aggro: LocalAggro::new(
                tuning.state.aggro_range,
                tuning.state.aggro_cooldown,
                tuning.state.eye_height,
            ),
            state: NavState::Idle,
            snapshot: SensorSnapshot::default(),
            facing_right: true,
            enabled: true,
            clock: 0.0,
            last_direction_change: None,
            pause: DelayTimer::default(),
            planning: DelayTimer::default(),
            steering: None,
            animation: AnimationParams::default(),
        }
    }

    pub fn with_self_collider(mut self, collider: ColliderId) -> Self {
        self.sensors = self.sensors.with_self_collider(collider);
        self
    }

    pub fn with_facing(mut self, facing_right: bool) -> Self {
        self.set_facing(facing_right);
        self
    }

    /// Turn without touching the direction-change cooldown
    pub fn set_facing(&mut self, facing_right: bool) {
        self.facing_right = facing_right;
    }

    pub fn with_target<T: TargetProvider + 'static>(mut self, target: T) -> Self {
        self.set_target(target);
        self
    }

    pub fn with_aggro<A: AggroProvider + 'static>(mut self, aggro: A) -> Self {
        self.aggro = Some(Box::new(aggro));
        self
    }

    // =========================================================================
    // Collaborator operations
    // =========================================================================

    pub fn set_target<T: TargetProvider + 'static>(&mut self, target: T) {
        self.target = Some(Box::new(target));
        self.arbiter.invalidate();
    }

    pub fn clear_target(&mut self) {
        self.target = None;
        self.route = ActiveRoute::default();
        self.arbiter.invalidate();
    }

    /// `None` switches back to the local aggro fallback
    pub fn set_aggro_provider(&mut self, aggro: Option<Box<dyn AggroProvider>>) {
        self.aggro = aggro;
    }

    /// Suspend evaluation and motion for `duration`, then resume
    pub fn pause_navigation(&mut self, duration: f32) -> TimerHandle {
        info!("Navigation paused for {:.2}s", duration);
        self.pause.schedule(self.clock, duration)
    }

    pub fn cancel_pause(&mut self, handle: TimerHandle) -> bool {
        self.pause.cancel_handle(handle)
    }

    pub fn enable_navigation(&mut self, enabled: bool, body: &mut KinematicBody) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        info!("Navigation {}", if enabled { "enabled" } else { "disabled" });
        if enabled {
            return;
        }

        self.climb.on_disable(body);
        self.jump.cancel();
        self.pause.cancel();
        self.planning.cancel();
        self.local_aggro.reset();
        self.route = ActiveRoute::default();
        self.arbiter.invalidate();
        self.state = NavState::Idle;
        body.velocity.x = 0.0;
        self.animation = AnimationParams::default();
    }

    /// External override (damage knock-back, cutscenes). Never vetoed.
    pub fn force_state(&mut self, state: NavState, body: &mut KinematicBody) {
        if state == self.state {
            return;
        }
        debug!("Nav state forced {} -> {}", self.state, state);
        if state != NavState::Climbing {
            self.climb.force_stop(body);
        }
        self.enter(state, body, ClimbPurpose::ReachTarget);
    }

    pub fn current_state(&self) -> NavState {
        self.state
    }

    pub fn facing_right(&self) -> bool {
        self.facing_right
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        self.snapshot
    }

    pub fn animation(&self) -> AnimationParams {
        self.animation
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn telemetry(&self) -> NavigationTelemetry {
        let decision = self.arbiter.last_decision();
        let climb = self.climb.state();
        NavigationTelemetry {
            state: self.state,
            facing_right: self.facing_right,
            enabled: self.enabled,
            paused: self.pause.is_pending(),
            pause_remaining: self.pause.remaining(self.clock),
            sensors: self.snapshot,
            route_choice: decision.map(|d| d.choice).unwrap_or_default(),
            direct_cost: decision.map_or(0.0, |d| d.direct_cost),
            alternate_cost: decision.and_then(|d| d.alternate_cost),
            steering: self.steering,
            route_remaining: self.route.remaining().len(),
            is_jumping: self.jump.is_jumping(),
            is_climbing: climb.is_climbing,
            is_at_ladder_top: climb.is_at_ladder_top,
            last_ladder_top_y: climb.last_ladder_top_y,
            gravity_reset_pending: climb.is_reset_pending(),
            last_direction_change: self.last_direction_change,
            clock: self.clock,
        }
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advance one simulation tick. Sets the body's velocity (and gravity
    /// scale while climbing); the caller integrates it.
    pub fn update<W: SpatialQuery + ?Sized>(&mut self, dt: f32, world: &W, body: &mut KinematicBody) {
        self.clock += dt;
        if !self.enabled {
            return;
        }
        let now = self.clock;

        self.climb.poll(body, now);

        if self.pause.is_pending() {
            if self.pause.poll(now) {
                info!("Navigation resumed");
            } else {
                body.velocity.x = 0.0;
                if body.gravity_scale == 0.0 {
                    body.velocity.y = 0.0;
                }
                return;
            }
        }

        if self.state == NavState::PathPlanning {
            if !self.planning.poll(now) {
                body.velocity.x = 0.0;
                self.refresh_animation(body);
                return;
            }
            self.facing_right = !self.facing_right;
            self.last_direction_change = Some(now);
            self.route = ActiveRoute::default();
            self.arbiter.invalidate();
            debug!("Nav state {} -> {} (flipped facing)", self.state, NavState::Walking);
            self.state = NavState::Walking;
        }

        let target = self.target.as_ref().and_then(|t| t.target_position());
        let feet = body.position;

        // Route arbitration, frozen mid-jump and mid-climb
        let reach = Vec2::new(self.tuning.route.waypoint_reach_x, self.tuning.route.waypoint_reach_y);
        let mut reachable = self.snapshot.is_target_reachable;
        match target {
            Some(target) => {
                if !matches!(self.state, NavState::Jumping | NavState::Climbing) {
                    let (decision, recomputed) = self.arbiter.evaluate(world, feet, target, now);
                    reachable = decision.is_reachable();
                    if recomputed {
                        self.route = match decision.choice {
                            RouteChoice::Alternate => {
                                ActiveRoute::new(decision.route.clone(), feet, reach)
                            }
                            RouteChoice::Direct => ActiveRoute::default(),
                        };
                    }
                }
                // Ladder waypoints only count once the top is reached
                if self.state != NavState::Climbing || self.climb.is_at_top() {
                    self.route.advance(feet, reach);
                }
            }
            None => {
                self.route = ActiveRoute::default();
                reachable = false;
            }
        }
        let steer = target.map(|t| self.route.current().unwrap_or(t));
        self.steering = steer;

        // Sensors
        let facing = self.facing_right;
        let is_grounded = self.sensors.is_grounded(world, body);
        let is_obstacle_ahead = self.sensors.is_obstacle_ahead(world, body, facing);
        let is_edge_ahead = self.sensors.is_edge_ahead(world, body, facing);
        let ladder_top = self.sensors.ladder(world, body).map(|ladder| ladder.max.y);
        let is_ladder_detected = self.climb.observe(ladder_top, feet.y, now);
        let is_target_above = steer.is_some_and(|s| self.sensors.is_target_above(body, s));
        self.snapshot = SensorSnapshot {
            is_grounded,
            is_obstacle_ahead,
            is_edge_ahead,
            is_ladder_detected,
            is_target_above,
            is_target_reachable: reachable,
        };

        // Aggro
        let is_aggro = match (target, &self.aggro) {
            (None, _) => false,
            (Some(t), Some(provider)) => provider.should_engage(feet, t),
            (Some(t), None) => self.local_aggro.evaluate(
                world,
                feet,
                t,
                reachable,
                self.tuning.layers.obstacle,
                now,
            ),
        };

        // Guards
        let min_distance = self.tuning.movement.min_target_distance;
        let dx = steer.map_or(0.0, |s| s.x - feet.x);
        let heading = dx.abs() > min_distance && dx.signum() == facing_sign(facing);

        let can_jump_over = is_obstacle_ahead
            && self
                .jump
                .can_jump_over(self.sensors.obstacle_height(world, body, facing));
        let can_jump_across = is_edge_ahead
            && self
                .jump
                .can_jump_across(self.sensors.edge_distance(world, body, facing));
        let should_jump = is_grounded
            && ((heading && is_obstacle_ahead && can_jump_over)
                || (heading && is_edge_ahead && can_jump_across)
                || (is_target_above
                    && !is_ladder_detected
                    && dx.abs() < self.tuning.sensors.jump_to_target_dx));

        let beyond_obstacle =
            steer.is_some_and(|s| self.sensors.is_target_beyond_obstacle(world, body, facing, s));
        let should_climb = is_ladder_detected
            && (is_target_above || (is_obstacle_ahead && !can_jump_over && beyond_obstacle));

        let guards = Guards {
            is_aggro,
            is_grounded,
            is_blocked: heading && is_obstacle_ahead,
            is_ladder_detected,
            is_jumping: self.jump.is_jumping(),
            is_climbing: self.climb.is_climbing(),
            should_jump,
            should_climb,
            climb_wanted: steer.is_some_and(|s| self.climb.wants_to_continue(feet.y, s.y)),
        };

        // Transition
        let mut next = decide_transition(self.state, &guards);
        if self.state == NavState::Climbing
            && next != NavState::Climbing
            && !self.climb.on_navigation_state_changed(next, is_grounded, body)
        {
            next = NavState::Climbing;
        }
        if next != self.state {
            debug!("Nav state {} -> {}", self.state, next);
            let purpose = if is_target_above {
                ClimbPurpose::ReachTarget
            } else {
                ClimbPurpose::CrossObstacle
            };
            self.enter(next, body, purpose);
        }

        // Facing follows the steering point, rate-limited
        if !matches!(self.state, NavState::Climbing | NavState::Jumping)
            && dx.abs() > min_distance
            && (dx > 0.0) != self.facing_right
            && self.can_change_direction(now)
        {
            self.facing_right = dx > 0.0;
            self.last_direction_change = Some(now);
        }

        // Per-state motion
        let speed = self.tuning.movement.move_speed;
        let move_x = if dx.abs() > min_distance {
            facing_sign(self.facing_right) * speed
        } else {
            0.0
        };
        match self.state {
            NavState::Idle | NavState::PathPlanning => body.velocity.x = 0.0,
            NavState::Walking => body.velocity.x = move_x,
            NavState::Jumping => self.jump.update(body, move_x, now),
            NavState::Climbing => {
                if let Some(goal) = steer {
                    self.climb.climb(body, goal, speed);
                }
            }
            NavState::Falling => {
                body.velocity.x = move_x * self.tuning.movement.falling_control;
            }
        }

        self.refresh_animation(body);
    }

    fn can_change_direction(&self, now: f32) -> bool {
        self.last_direction_change
            .is_none_or(|last| now - last >= self.tuning.movement.direction_change_cooldown)
    }

    /// Enter actions
    fn enter(&mut self, next: NavState, body: &mut KinematicBody, purpose: ClimbPurpose) {
        let now = self.clock;
        match self.state {
            NavState::Jumping => self.jump.cancel(),
            NavState::PathPlanning => self.planning.cancel(),
            _ => {}
        }

        match next {
            NavState::Jumping => self.jump.begin(body, now),
            NavState::Climbing => self.climb.begin(body, purpose),
            NavState::PathPlanning => {
                self.planning
                    .schedule(now, self.tuning.state.path_planning_pause);
                body.velocity.x = 0.0;
            }
            NavState::Idle => body.velocity.x = 0.0,
            NavState::Walking | NavState::Falling => {}
        }
        self.state = next;
    }

    fn refresh_animation(&mut self, body: &KinematicBody) {
        self.animation = AnimationParams {
            walking: self.state == NavState::Walking && body.velocity.x.abs() > f32::EPSILON,
            jumping: self.state == NavState::Jumping,
            falling: self.state == NavState::Falling,
            climbing: self.state == NavState::Climbing,
            grounded: self.snapshot.is_grounded,
        };
    }
}
