//! Climb controller - ladder engagement with top-of-ladder hysteresis
//!
//! NotClimbing -> Climbing -> AtLadderTop -> NotClimbing. Gravity is zeroed
//! for the whole cycle and restored whenever it ends. A lost ladder contact
//! only restores gravity after a cancellable delay, so a one-tick sensor
//! gap does not drop the agent mid-climb.

use bevy::log::debug;
use bevy::prelude::*;

use crate::ai::agent::NavState;
use crate::ai::schedule::DelayTimer;
use crate::tuning::ClimbTuning;
use crate::world::KinematicBody;

/// Why the current climb started. Decides when the climb is done.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClimbPurpose {
    /// The steering point is above the agent
    #[default]
    ReachTarget,
    /// Going over an obstacle that cannot be jumped
    CrossObstacle,
}

#[derive(Clone, Debug, Default)]
pub struct ClimbState {
    pub is_climbing: bool,
    pub is_at_ladder_top: bool,
    pub last_ladder_top_y: Option<f32>,
    /// Gravity scale to restore; `Some` exactly while gravity is zeroed
    pub original_gravity_scale: Option<f32>,
    pub purpose: ClimbPurpose,
    /// Raw ladder contact last tick
    was_on_ladder: bool,
    gravity_reset: DelayTimer,
}

impl ClimbState {
    pub fn is_reset_pending(&self) -> bool {
        self.gravity_reset.is_pending()
    }
}

#[derive(Clone, Debug)]
pub struct ClimbController {
    tuning: ClimbTuning,
    state: ClimbState,
}

impl ClimbController {
    pub fn new(tuning: &ClimbTuning) -> Self {
        Self {
            tuning: tuning.clone(),
            state: ClimbState::default(),
        }
    }

    pub fn state(&self) -> &ClimbState {
        &self.state
    }

    pub fn is_climbing(&self) -> bool {
        self.state.is_climbing
    }

    pub fn is_at_top(&self) -> bool {
        self.state.is_at_ladder_top
    }

    /// Ladder presence with hysteresis: at the top, presence holds while
    /// the feet stay within the top buffer of the recorded top height
    pub fn ladder_present(&self, raw_detected: bool, feet_y: f32) -> bool {
        if raw_detected {
            return true;
        }
        match (self.state.is_at_ladder_top, self.state.last_ladder_top_y) {
            (true, Some(top)) => (feet_y - top).abs() <= self.tuning.top_buffer,
            _ => false,
        }
    }

    /// Feed this tick's raw ladder reading. Returns the ladder presence the
    /// state machine should see.
    pub fn observe(&mut self, ladder_top: Option<f32>, feet_y: f32, now: f32) -> bool {
        let raw = ladder_top.is_some();
        if let Some(top) = ladder_top {
            self.state.last_ladder_top_y = Some(top);
        }

        if raw {
            if self.state.gravity_reset.is_pending() {
                self.state.gravity_reset.cancel();
                debug!("Ladder contact regained, gravity reset cancelled");
            }
        } else if self.state.was_on_ladder
            && self.state.is_climbing
            && !self.state.gravity_reset.is_pending()
        {
            self.state
                .gravity_reset
                .schedule(now, self.tuning.gravity_reset_delay);
            debug!(
                "Ladder contact lost, gravity reset in {:.1}s",
                self.tuning.gravity_reset_delay
            );
        }
        self.state.was_on_ladder = raw;

        // The pending reset is the grace period for a sensor gap
        self.ladder_present(raw, feet_y)
            || (self.state.is_climbing && self.state.gravity_reset.is_pending())
    }

    /// Fire the delayed gravity reset if it is due. Returns true when the
    /// climb ended this tick.
    pub fn poll(&mut self, body: &mut KinematicBody, now: f32) -> bool {
        if !self.state.gravity_reset.poll(now) {
            return false;
        }
        debug!("Gravity reset fired, climb ended");
        self.finish(body);
        true
    }

    pub fn begin(&mut self, body: &mut KinematicBody, purpose: ClimbPurpose) {
        self.state.gravity_reset.cancel();
        if self.state.original_gravity_scale.is_none() {
            self.state.original_gravity_scale = Some(body.gravity_scale);
        }
        body.gravity_scale = 0.0;
        body.velocity = Vec2::ZERO;
        self.state.is_climbing = true;
        self.state.is_at_ladder_top = false;
        self.state.purpose = purpose;
        debug!("Climb started ({:?})", purpose);
    }

    /// Does the latched purpose still want to keep climbing? A goal at or
    /// above the ladder top keeps the climb going until the top snap.
    pub fn wants_to_continue(&self, feet_y: f32, goal_y: f32) -> bool {
        if self.state.is_at_ladder_top {
            return false;
        }
        match (self.state.purpose, self.state.last_ladder_top_y) {
            (ClimbPurpose::CrossObstacle, _) => true,
            (ClimbPurpose::ReachTarget, Some(top)) if goal_y >= top => true,
            (ClimbPurpose::ReachTarget, _) => goal_y - feet_y > self.tuning.snap_tolerance,
        }
    }

    /// Per-tick climb motion toward `goal`. At the top the agent dismounts
    /// sideways toward the goal with gravity still off.
    pub fn climb(&mut self, body: &mut KinematicBody, goal: Vec2, move_speed: f32) {
        if !self.state.is_climbing {
            return;
        }

        if self.state.is_at_ladder_top {
            let dx = goal.x - body.position.x;
            body.velocity.x = if dx.abs() > self.tuning.snap_tolerance {
                dx.signum() * move_speed * self.tuning.dismount_speed_factor
            } else {
                0.0
            };
            body.velocity.y = 0.0;
            return;
        }

        body.velocity.x = 0.0;
        let top = self.state.last_ladder_top_y;
        let goal_y = match (self.state.purpose, top) {
            (ClimbPurpose::CrossObstacle, Some(top)) => top,
            (_, Some(top)) => goal.y.min(top),
            (_, None) => goal.y,
        };

        if let Some(top) = top
            && goal_y >= top
            && (top - body.position.y).abs() <= self.tuning.snap_tolerance
        {
            body.position.y = top;
            body.velocity.y = 0.0;
            self.state.is_at_ladder_top = true;
            debug!("Reached ladder top at y={:.2}", top);
            return;
        }

        let dy = goal_y - body.position.y;
        if dy.abs() <= self.tuning.snap_tolerance {
            body.velocity.y = 0.0;
            return;
        }

        let mut speed = self.tuning.climb_speed;
        if let Some(top) = top {
            let to_top = top - body.position.y;
            if dy > 0.0 && to_top < self.tuning.slow_zone {
                let factor = (to_top / self.tuning.slow_zone).max(self.tuning.min_speed_factor);
                speed *= factor;
            }
        }
        body.velocity.y = dy.signum() * speed;
    }

    /// Asked before the state machine leaves Climbing. Returns false to veto:
    /// at the top and not yet standing on the landing, Walking and Falling
    /// are refused.
    pub fn on_navigation_state_changed(
        &mut self,
        new_state: NavState,
        grounded: bool,
        body: &mut KinematicBody,
    ) -> bool {
        if new_state == NavState::Climbing {
            return true;
        }
        if self.state.is_at_ladder_top
            && matches!(new_state, NavState::Walking | NavState::Falling)
            && !grounded
        {
            debug!("Climb controller kept Climbing (requested {:?})", new_state);
            return false;
        }
        self.finish(body);
        true
    }

    /// External override (damage knock-back and the like). Never vetoed.
    pub fn force_stop(&mut self, body: &mut KinematicBody) {
        if self.state.is_climbing || self.state.original_gravity_scale.is_some() {
            debug!("Climb force-stopped");
        }
        self.finish(body);
    }

    pub fn on_disable(&mut self, body: &mut KinematicBody) {
        self.finish(body);
        self.state.was_on_ladder = false;
    }

    /// End the cycle: cancel the reset and restore gravity
    fn finish(&mut self, body: &mut KinematicBody) {
        self.state.gravity_reset.cancel();
        self.state.is_climbing = false;
        self.state.is_at_ladder_top = false;
        if let Some(scale) = self.state.original_gravity_scale.take() {
            body.gravity_scale = scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    const TOP: f32 = 3.0;

    fn climbing() -> (ClimbController, KinematicBody) {
        let mut climb = ClimbController::new(&ClimbTuning::default());
        let mut body = KinematicBody::at(Vec2::new(3.0, 0.0));
        climb.observe(Some(TOP), body.position.y, 0.0);
        climb.begin(&mut body, ClimbPurpose::ReachTarget);
        (climb, body)
    }

    fn run_to_top(climb: &mut ClimbController, body: &mut KinematicBody) {
        let mut now = 0.0;
        for _ in 0..400 {
            now += FIXED_DT;
            climb.observe(Some(TOP), body.position.y, now);
            climb.climb(body, Vec2::new(3.0, 4.0), MOVE_SPEED);
            body.position += body.velocity * FIXED_DT;
            if climb.is_at_top() {
                return;
            }
        }
        panic!("never reached the top");
    }

    #[test]
    fn test_begin_zeroes_gravity_and_finish_restores() {
        let (mut climb, mut body) = climbing();
        assert_eq!(body.gravity_scale, 0.0);
        assert_eq!(climb.state().original_gravity_scale, Some(GRAVITY_SCALE));
        climb.on_disable(&mut body);
        assert_eq!(body.gravity_scale, GRAVITY_SCALE);
        assert!(!climb.is_climbing());
    }

    #[test]
    fn test_climbs_and_snaps_to_top() {
        let (mut climb, mut body) = climbing();
        run_to_top(&mut climb, &mut body);
        assert_eq!(body.position.y, TOP);
        assert!(climb.is_climbing());
    }

    #[test]
    fn test_slows_near_top() {
        let (mut climb, mut body) = climbing();
        climb.climb(&mut body, Vec2::new(3.0, 4.0), MOVE_SPEED);
        assert_eq!(body.velocity.y, CLIMB_SPEED);
        body.position.y = TOP - CLIMB_SLOW_ZONE / 2.0;
        climb.climb(&mut body, Vec2::new(3.0, 4.0), MOVE_SPEED);
        assert!(body.velocity.y < CLIMB_SPEED);
        assert!(body.velocity.y >= CLIMB_SPEED * CLIMB_MIN_SPEED_FACTOR);
    }

    #[test]
    fn test_top_hysteresis_holds_presence() {
        let (mut climb, mut body) = climbing();
        run_to_top(&mut climb, &mut body);
        // Sensor flicker right at the top
        assert!(climb.observe(None, TOP + 0.1, 10.0));
        assert!(climb.ladder_present(false, TOP - LADDER_TOP_BUFFER / 2.0));
        assert!(!climb.ladder_present(false, TOP + LADDER_TOP_BUFFER + 0.1));
    }

    #[test]
    fn test_dropout_clears_only_after_delay() {
        let (mut climb, mut body) = climbing();
        run_to_top(&mut climb, &mut body);
        body.position.y = TOP + 1.0;

        // Single-tick dropout outside the top buffer
        assert!(climb.observe(None, body.position.y, 1.0));
        assert!(!climb.poll(&mut body, 1.0 + FIXED_DT));
        assert!(climb.is_climbing());
        assert_eq!(body.gravity_scale, 0.0);

        assert!(!climb.poll(&mut body, 1.0 + GRAVITY_RESET_DELAY - 0.1));
        assert!(climb.is_climbing());
        assert!(climb.poll(&mut body, 1.0 + GRAVITY_RESET_DELAY));
        assert!(!climb.is_climbing());
        assert_eq!(body.gravity_scale, GRAVITY_SCALE);
    }

    #[test]
    fn test_redetection_cancels_reset() {
        let (mut climb, mut body) = climbing();
        body.position.y = 1.0;
        climb.observe(None, body.position.y, 1.0);
        assert!(climb.state().is_reset_pending());
        assert!(climb.observe(Some(TOP), body.position.y, 1.5));
        assert!(!climb.state().is_reset_pending());
        assert!(!climb.poll(&mut body, 10.0));
        assert!(climb.is_climbing());
    }

    #[test]
    fn test_veto_at_top_until_grounded() {
        let (mut climb, mut body) = climbing();
        run_to_top(&mut climb, &mut body);
        assert!(!climb.on_navigation_state_changed(NavState::Walking, false, &mut body));
        assert!(!climb.on_navigation_state_changed(NavState::Falling, false, &mut body));
        assert_eq!(body.gravity_scale, 0.0);
        assert!(climb.on_navigation_state_changed(NavState::Walking, true, &mut body));
        assert_eq!(body.gravity_scale, GRAVITY_SCALE);
    }

    #[test]
    fn test_force_stop_is_never_vetoed() {
        let (mut climb, mut body) = climbing();
        run_to_top(&mut climb, &mut body);
        climb.force_stop(&mut body);
        assert!(!climb.is_climbing());
        assert!(!climb.is_at_top());
        assert_eq!(body.gravity_scale, GRAVITY_SCALE);
    }

    #[test]
    fn test_dismount_moves_toward_goal() {
        let (mut climb, mut body) = climbing();
        run_to_top(&mut climb, &mut body);
        climb.climb(&mut body, Vec2::new(5.0, TOP), MOVE_SPEED);
        assert!(body.velocity.x > 0.0);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn test_latched_purpose() {
        let (mut climb, mut body) = climbing();
        assert!(climb.wants_to_continue(0.0, 2.0));
        assert!(!climb.wants_to_continue(0.0, 0.0));
        // Goal on the landing: keep climbing right up to the snap
        assert!(climb.wants_to_continue(TOP - CLIMB_SNAP_TOLERANCE / 2.0, TOP));
        climb.begin(&mut body, ClimbPurpose::CrossObstacle);
        // Keeps going even though the goal is level with the feet
        assert!(climb.wants_to_continue(0.0, 0.0));
        run_to_top(&mut climb, &mut body);
        assert!(!climb.wants_to_continue(TOP, TOP + 1.0));
    }
}
