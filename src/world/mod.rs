//! World geometry: colliders, surface classification and the synthetic
//! spatial query backend the sensors run against.

mod physics;
mod query;

pub use physics::*;
pub use query::*;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Which layers count as ground, obstacle and ladder for sensor queries
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceLayers {
    pub ground: LayerMask,
    pub obstacle: LayerMask,
    pub ladder: LayerMask,
}

impl Default for SurfaceLayers {
    fn default() -> Self {
        Self {
            ground: LayerMask::GROUND,
            obstacle: LayerMask::OBSTACLE,
            ladder: LayerMask::LADDER,
        }
    }
}

impl SurfaceLayers {
    /// Layers the body integrator treats as solid
    pub fn solid(&self) -> LayerMask {
        self.ground.union(self.obstacle)
    }
}

/// Axis-aligned level collider
#[derive(Clone, Copy, Debug)]
pub struct Collider {
    pub id: ColliderId,
    pub bounds: Aabb,
    pub layers: LayerMask,
    pub is_trigger: bool,
}

impl Collider {
    fn hit(&self, distance: f32, point: Vec2) -> ProbeHit {
        ProbeHit {
            collider: self.id,
            bounds: self.bounds,
            layers: self.layers,
            is_trigger: self.is_trigger,
            distance,
            point,
        }
    }
}

/// Static level geometry. Read-only during simulation.
#[derive(Resource, Clone, Debug, Default)]
pub struct LevelGeometry {
    colliders: Vec<Collider>,
}

impl LevelGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a solid box and return its id
    pub fn add_solid(&mut self, min: Vec2, max: Vec2, layers: LayerMask) -> ColliderId {
        self.push(Aabb::new(min, max), layers, false)
    }

    /// Add a trigger volume (ladders are triggers)
    pub fn add_trigger(&mut self, min: Vec2, max: Vec2, layers: LayerMask) -> ColliderId {
        self.push(Aabb::new(min, max), layers, true)
    }

    fn push(&mut self, bounds: Aabb, layers: LayerMask, is_trigger: bool) -> ColliderId {
        let id = ColliderId(self.colliders.len() as u32);
        self.colliders.push(Collider {
            id,
            bounds,
            layers,
            is_trigger,
        });
        id
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }
}

impl SpatialQuery for LevelGeometry {
    fn probe_area(&self, center: Vec2, half_extents: Vec2, mask: LayerMask) -> Vec<ProbeHit> {
        let area = Aabb::from_center_half_extents(center, half_extents.abs());
        self.colliders
            .iter()
            .filter(|c| c.layers.intersects(mask) && c.bounds.overlaps(&area))
            .map(|c| c.hit(0.0, center))
            .collect()
    }

    fn probe_ray(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: LayerMask,
    ) -> Vec<ProbeHit> {
        let Some(dir) = direction.try_normalize() else {
            return Vec::new();
        };
        if max_distance <= 0.0 {
            return Vec::new();
        }

        let mut hits: Vec<ProbeHit> = self
            .colliders
            .iter()
            .filter(|c| c.layers.intersects(mask))
            .filter_map(|c| {
                c.bounds
                    .ray_distance(origin, dir, max_distance)
                    .map(|t| c.hit(t, origin + dir * t))
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> LevelGeometry {
        let mut geo = LevelGeometry::new();
        geo.add_solid(Vec2::new(-10.0, -1.0), Vec2::new(10.0, 0.0), LayerMask::GROUND);
        geo.add_solid(Vec2::new(2.0, 0.0), Vec2::new(3.0, 2.0), LayerMask::WALL);
        geo.add_trigger(Vec2::new(5.0, 0.0), Vec2::new(6.0, 4.0), LayerMask::LADDER);
        geo
    }

    #[test]
    fn test_probe_area_filters_by_mask() {
        let geo = geometry();
        let hits = geo.probe_area(Vec2::new(2.5, 1.0), Vec2::splat(0.2), LayerMask::OBSTACLE);
        assert_eq!(hits.len(), 1);
        let ladder = geo.probe_area(Vec2::new(5.5, 1.0), Vec2::splat(0.2), LayerMask::LADDER);
        assert_eq!(ladder.len(), 1);
        assert!(ladder[0].is_trigger);
    }

    #[test]
    fn test_probe_ray_sorted_nearest_first() {
        let geo = geometry();
        let hits = geo.probe_ray(Vec2::new(0.0, 1.0), Vec2::X, 10.0, LayerMask::ALL);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance < hits[1].distance);
        assert!(!hits[0].is_trigger);
    }

    #[test]
    fn test_probe_ray_zero_direction_is_empty() {
        let geo = geometry();
        assert!(geo.probe_ray(Vec2::ZERO, Vec2::ZERO, 5.0, LayerMask::ALL).is_empty());
    }
}
