//! Target and aggro collaborators
//!
//! The owning game registers a target with `set_target` instead of the
//! agent searching for one. Aggro comes from an external perception
//! provider when there is one, otherwise from `LocalAggro`.

use std::sync::{Arc, RwLock};

use bevy::prelude::*;

use crate::world::{LayerMask, SpatialQuery};

/// Source of the position the agent pursues. `None` means no target.
pub trait TargetProvider: Send + Sync {
    fn target_position(&self) -> Option<Vec2>;
}

/// A fixed target
impl TargetProvider for Vec2 {
    fn target_position(&self) -> Option<Vec2> {
        Some(*self)
    }
}

/// Target shared with (and moved by) another owner, e.g. the player system
#[derive(Clone, Debug, Default)]
pub struct SharedTarget(Arc<RwLock<Option<Vec2>>>);

impl SharedTarget {
    pub fn new(position: Option<Vec2>) -> Self {
        Self(Arc::new(RwLock::new(position)))
    }

    pub fn set(&self, position: Option<Vec2>) {
        if let Ok(mut slot) = self.0.write() {
            *slot = position;
        }
    }
}

impl TargetProvider for SharedTarget {
    fn target_position(&self) -> Option<Vec2> {
        // A poisoned lock reads as "no target"
        self.0.read().ok().and_then(|slot| *slot)
    }
}

/// External "should engage" signal
pub trait AggroProvider: Send + Sync {
    fn should_engage(&self, agent: Vec2, target: Vec2) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAggro;

impl AggroProvider for AlwaysAggro {
    fn should_engage(&self, _agent: Vec2, _target: Vec2) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NeverAggro;

impl AggroProvider for NeverAggro {
    fn should_engage(&self, _agent: Vec2, _target: Vec2) -> bool {
        false
    }
}

/// Fallback aggro: target in range and either visible or reachable,
/// held for a cooldown after the last positive reading
#[derive(Clone, Debug)]
pub struct LocalAggro {
    range: f32,
    cooldown: f32,
    eye_height: f32,
    last_engaged: Option<f32>,
}

impl LocalAggro {
    pub fn new(range: f32, cooldown: f32, eye_height: f32) -> Self {
        Self {
            range,
            cooldown,
            eye_height,
            last_engaged: None,
        }
    }

    pub fn has_line_of_sight<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        agent: Vec2,
        target: Vec2,
        obstacle_mask: LayerMask,
    ) -> bool {
        let eye = Vec2::new(0.0, self.eye_height);
        let (from, to) = (agent + eye, target + eye);
        let delta = to - from;
        let distance = delta.length();
        distance <= f32::EPSILON
            || !world
                .probe_ray(from, delta, distance, obstacle_mask)
                .iter()
                .any(|hit| !hit.is_trigger)
    }

    pub fn evaluate<W: SpatialQuery + ?Sized>(
        &mut self,
        world: &W,
        agent: Vec2,
        target: Vec2,
        reachable: bool,
        obstacle_mask: LayerMask,
        now: f32,
    ) -> bool {
        let in_range = agent.distance(target) <= self.range;
        if in_range && (reachable || self.has_line_of_sight(world, agent, target, obstacle_mask)) {
            self.last_engaged = Some(now);
            return true;
        }
        self.last_engaged
            .is_some_and(|last| now - last <= self.cooldown)
    }

    pub fn reset(&mut self) {
        self.last_engaged = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::LevelGeometry;

    #[test]
    fn test_shared_target_follows_owner() {
        let shared = SharedTarget::new(None);
        let provider: Box<dyn TargetProvider> = Box::new(shared.clone());
        assert_eq!(provider.target_position(), None);
        shared.set(Some(Vec2::new(3.0, 1.0)));
        assert_eq!(provider.target_position(), Some(Vec2::new(3.0, 1.0)));
    }

    #[test]
    fn test_local_aggro_range_and_cooldown() {
        let geo = LevelGeometry::new();
        let mut aggro = LocalAggro::new(10.0, 3.0, 1.5);
        let agent = Vec2::ZERO;
        assert!(aggro.evaluate(&geo, agent, Vec2::new(5.0, 0.0), false, LayerMask::OBSTACLE, 0.0));
        // Out of range, still held by the cooldown
        assert!(aggro.evaluate(&geo, agent, Vec2::new(50.0, 0.0), false, LayerMask::OBSTACLE, 2.0));
        assert!(!aggro.evaluate(&geo, agent, Vec2::new(50.0, 0.0), false, LayerMask::OBSTACLE, 3.5));
    }

    #[test]
    fn test_local_aggro_needs_sight_or_route() {
        let mut geo = LevelGeometry::new();
        geo.add_solid(Vec2::new(2.0, 0.0), Vec2::new(3.0, 5.0), LayerMask::WALL);
        let mut aggro = LocalAggro::new(10.0, 3.0, 1.5);
        let target = Vec2::new(6.0, 0.0);
        assert!(!aggro.evaluate(&geo, Vec2::ZERO, target, false, LayerMask::OBSTACLE, 0.0));
        assert!(aggro.evaluate(&geo, Vec2::ZERO, target, true, LayerMask::OBSTACLE, 0.1));
    }
}
