//! Kinematic body integration against level geometry

use bevy::prelude::*;

use super::{Aabb, LayerMask, LevelGeometry};
use crate::constants::*;

/// Agent body. `position` is the bottom-center (feet).
#[derive(Component, Clone, Debug)]
pub struct KinematicBody {
    pub position: Vec2,
    pub velocity: Vec2,
    pub gravity_scale: f32,
    pub size: Vec2,
}

impl Default for KinematicBody {
    fn default() -> Self {
        Self::at(Vec2::ZERO)
    }
}

impl KinematicBody {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            gravity_scale: GRAVITY_SCALE,
            size: AGENT_SIZE,
        }
    }

    pub fn half_width(&self) -> f32 {
        self.size.x / 2.0
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(
            Vec2::new(self.position.x - self.half_width(), self.position.y),
            Vec2::new(self.position.x + self.half_width(), self.position.y + self.size.y),
        )
    }

    pub fn center(&self) -> Vec2 {
        self.position + Vec2::new(0.0, self.size.y / 2.0)
    }
}

/// Apply gravity and velocity for one tick, then push the body out of
/// solid colliders one axis at a time (horizontal first).
pub fn integrate_body(
    body: &mut KinematicBody,
    geometry: &LevelGeometry,
    solid: LayerMask,
    gravity: f32,
    dt: f32,
) {
    body.velocity.y -= gravity * body.gravity_scale * dt;

    let solids = || {
        geometry
            .colliders()
            .iter()
            .filter(move |c| !c.is_trigger && c.layers.intersects(solid))
    };

    // Horizontal pass
    body.position.x += body.velocity.x * dt;
    for collider in solids() {
        let aabb = body.aabb();
        if !aabb.overlaps(&collider.bounds) {
            continue;
        }
        if body.velocity.x > 0.0 {
            body.position.x = collider.bounds.min.x - body.half_width();
        } else if body.velocity.x < 0.0 {
            body.position.x = collider.bounds.max.x + body.half_width();
        } else {
            // Spawned or resting inside: eject toward the nearer side
            let to_left = aabb.max.x - collider.bounds.min.x;
            let to_right = collider.bounds.max.x - aabb.min.x;
            if to_left < to_right {
                body.position.x -= to_left;
            } else {
                body.position.x += to_right;
            }
        }
        body.velocity.x = 0.0;
    }

    // Vertical pass
    body.position.y += body.velocity.y * dt;
    for collider in solids() {
        if !body.aabb().overlaps(&collider.bounds) {
            continue;
        }
        if body.velocity.y <= 0.0 {
            // Land on top
            body.position.y = collider.bounds.max.y;
        } else {
            // Hit ceiling
            body.position.y = collider.bounds.min.y - body.size.y;
        }
        body.velocity.y = 0.0;
    }
}
