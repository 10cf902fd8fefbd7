//! Spatial query interface used by the environment sensors.
//!
//! Sensors never talk to a physics engine directly; they go through
//! `SpatialQuery` so tests can hand them deterministic synthetic geometry.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Bit set of physical layers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const ALL: LayerMask = LayerMask(u32::MAX);

    pub const GROUND: LayerMask = LayerMask(1 << 0);
    pub const OBSTACLE: LayerMask = LayerMask(1 << 1);
    pub const LADDER: LayerMask = LayerMask(1 << 2);
    /// Solid block: stand on it and walk into it
    pub const WALL: LayerMask = LayerMask(Self::GROUND.0 | Self::OBSTACLE.0);

    pub const fn union(self, other: LayerMask) -> LayerMask {
        LayerMask(self.0 | other.0)
    }

    pub const fn intersects(self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Parse a layer name as used in level files
    pub fn from_name(name: &str) -> Option<LayerMask> {
        match name.to_ascii_lowercase().as_str() {
            "ground" => Some(Self::GROUND),
            "obstacle" => Some(Self::OBSTACLE),
            "ladder" => Some(Self::LADDER),
            "wall" => Some(Self::WALL),
            _ => None,
        }
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Strict overlap: touching faces do not count
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Strict containment (points on the boundary are outside)
    pub fn contains(&self, point: Vec2) -> bool {
        point.x > self.min.x && point.x < self.max.x && point.y > self.min.y && point.y < self.max.y
    }

    /// Slab test. Returns the entry distance along `direction` (unit length),
    /// or `None` when the ray misses within `max_distance`.
    /// A ray running parallel to a face must be strictly inside the slab,
    /// so grazing along a surface is not a hit.
    pub fn ray_distance(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_distance;

        for axis in 0..2 {
            let o = origin[axis];
            let d = direction[axis];
            let lo = self.min[axis];
            let hi = self.max[axis];

            if d.abs() < 1e-6 {
                if o <= lo || o >= hi {
                    return None;
                }
            } else {
                let inv = 1.0 / d;
                let mut t1 = (lo - o) * inv;
                let mut t2 = (hi - o) * inv;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }

        Some(t_min)
    }
}

/// Stable identifier of a collider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColliderId(pub u32);

/// One result of an area or ray probe
#[derive(Clone, Copy, Debug)]
pub struct ProbeHit {
    pub collider: ColliderId,
    pub bounds: Aabb,
    pub layers: LayerMask,
    pub is_trigger: bool,
    /// Distance along the ray (0 for area probes)
    pub distance: f32,
    pub point: Vec2,
}

impl ProbeHit {
    /// Usable by a sensor: not the agent itself and not a trigger volume
    pub fn is_solid_other(&self, self_collider: Option<ColliderId>) -> bool {
        !self.is_trigger && Some(self.collider) != self_collider
    }
}

/// Narrow physics query interface (area overlap and ray cast)
pub trait SpatialQuery {
    /// All colliders overlapping the box, filtered by layer mask
    fn probe_area(&self, center: Vec2, half_extents: Vec2, mask: LayerMask) -> Vec<ProbeHit>;

    /// All colliders hit by the ray, nearest first, filtered by layer mask.
    /// `direction` need not be normalized.
    fn probe_ray(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: LayerMask,
    ) -> Vec<ProbeHit>;
}

/// Wraps a query and counts every probe made through it
#[cfg(test)]
pub(crate) struct CountingQuery<'a, W: SpatialQuery> {
    pub inner: &'a W,
    pub probes: std::cell::Cell<usize>,
}

#[cfg(test)]
impl<'a, W: SpatialQuery> CountingQuery<'a, W> {
    pub fn new(inner: &'a W) -> Self {
        Self {
            inner,
            probes: std::cell::Cell::new(0),
        }
    }
}

#[cfg(test)]
impl<W: SpatialQuery> SpatialQuery for CountingQuery<'_, W> {
    fn probe_area(&self, center: Vec2, half_extents: Vec2, mask: LayerMask) -> Vec<ProbeHit> {
        self.probes.set(self.probes.get() + 1);
        self.inner.probe_area(center, half_extents, mask)
    }

    fn probe_ray(
        &self,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: LayerMask,
    ) -> Vec<ProbeHit> {
        self.probes.set(self.probes.get() + 1);
        self.inner.probe_ray(origin, direction, max_distance, mask)
    }
}
