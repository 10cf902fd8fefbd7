//! Environment sensors - physical queries around an agent
//!
//! Sensors hold only configuration. Every query takes the world and the
//! agent's body, so the same sensors run against live geometry or a
//! hand-built test level.

use bevy::log::warn;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_EDGE_SCAN_SAMPLES;
use crate::error::NavError;
use crate::helpers::facing_sign;
use crate::tuning::SensorTuning;
use crate::world::{Aabb, ColliderId, KinematicBody, LayerMask, SpatialQuery, SurfaceLayers};

/// Height above the feet that downward probes start from
const PROBE_LIFT: f32 = 0.1;

/// One tick of sensor readings
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub is_grounded: bool,
    pub is_obstacle_ahead: bool,
    pub is_edge_ahead: bool,
    pub is_ladder_detected: bool,
    pub is_target_above: bool,
    pub is_target_reachable: bool,
}

#[derive(Clone, Debug)]
pub struct EnvironmentSensors {
    tuning: SensorTuning,
    layers: SurfaceLayers,
    /// Ground check point relative to the feet
    ground_check_offset: Vec2,
    self_collider: Option<ColliderId>,
}

impl EnvironmentSensors {
    pub fn new(tuning: &SensorTuning, layers: SurfaceLayers) -> Self {
        let ground_check_offset = match tuning.ground_check_point {
            Some([x, y]) => Vec2::new(x, y),
            None => {
                warn!(
                    "{}, falling back to the agent's feet",
                    NavError::SensorUnavailable("ground check point")
                );
                Vec2::ZERO
            }
        };
        Self {
            tuning: tuning.clone(),
            layers,
            ground_check_offset,
            self_collider: None,
        }
    }

    /// Exclude the agent's own collider from every query
    pub fn with_self_collider(mut self, collider: ColliderId) -> Self {
        self.self_collider = Some(collider);
        self
    }

    pub fn tuning(&self) -> &SensorTuning {
        &self.tuning
    }

    fn any_solid<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        center: Vec2,
        half_extents: Vec2,
        mask: LayerMask,
    ) -> bool {
        world
            .probe_area(center, half_extents, mask)
            .iter()
            .any(|hit| hit.is_solid_other(self.self_collider))
    }

    /// Distance to the first usable hit along a ray
    fn first_solid<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        origin: Vec2,
        direction: Vec2,
        max_distance: f32,
        mask: LayerMask,
    ) -> Option<f32> {
        world
            .probe_ray(origin, direction, max_distance, mask)
            .iter()
            .find(|hit| hit.is_solid_other(self.self_collider))
            .map(|hit| hit.distance)
    }

    fn has_ground_below<W: SpatialQuery + ?Sized>(&self, world: &W, x: f32, feet_y: f32) -> bool {
        let origin = Vec2::new(x, feet_y + PROBE_LIFT);
        self.first_solid(
            world,
            origin,
            Vec2::NEG_Y,
            self.tuning.edge_probe_depth,
            self.layers.ground,
        )
        .is_some()
    }

    /// Area check under the feet, backed up by short downward rays.
    /// Either one finding ground is enough.
    pub fn is_grounded<W: SpatialQuery + ?Sized>(&self, world: &W, body: &KinematicBody) -> bool {
        let check = body.position + self.ground_check_offset;
        let depth = self.tuning.ground_check_depth;
        let area_hit = self.any_solid(
            world,
            check - Vec2::new(0.0, depth / 2.0),
            Vec2::new(self.tuning.ground_check_radius, depth / 2.0),
            self.layers.ground,
        );
        if area_hit {
            return true;
        }

        // Rays start just above the check point so a body resting exactly
        // on a surface still registers it
        let lift = self.tuning.step_clearance;
        self.tuning.ground_probe_offsets.iter().any(|offset| {
            let origin = Vec2::new(check.x + offset, check.y + lift);
            self.first_solid(
                world,
                origin,
                Vec2::NEG_Y,
                self.tuning.ground_probe_distance,
                self.layers.ground,
            )
            .is_some()
        })
    }

    /// Forward ray distance to the nearest obstacle, measured from the
    /// leading edge of the body
    pub fn obstacle_distance<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        body: &KinematicBody,
        facing_right: bool,
    ) -> Option<f32> {
        let dir = facing_sign(facing_right);
        let origin = Vec2::new(
            body.position.x + dir * body.half_width(),
            body.position.y + self.tuning.obstacle_ray_height,
        );
        self.first_solid(
            world,
            origin,
            Vec2::new(dir, 0.0),
            self.tuning.obstacle_ray_distance,
            self.layers.obstacle,
        )
    }

    /// Area query in front of the body, cross-checked with a forward ray
    pub fn is_obstacle_ahead<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        body: &KinematicBody,
        facing_right: bool,
    ) -> bool {
        let dir = facing_sign(facing_right);
        let front = body.position.x + dir * body.half_width();
        let bottom = body.position.y + self.tuning.step_clearance;
        let top = body.position.y + body.size.y;
        let area = Aabb::new(
            Vec2::new(front, bottom),
            Vec2::new(front + dir * self.tuning.obstacle_area_depth, top),
        );
        let half = (area.max - area.min) / 2.0;

        self.any_solid(world, area.min + half, half, self.layers.obstacle)
            || self.obstacle_distance(world, body, facing_right).is_some()
    }

    /// True when there is no ground one probe distance ahead
    pub fn is_edge_ahead<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        body: &KinematicBody,
        facing_right: bool,
    ) -> bool {
        let x = body.position.x + facing_sign(facing_right) * self.tuning.edge_probe_distance;
        !self.has_ground_below(world, x, body.position.y)
    }

    /// Lowest probe height (ascending) at which the way forward is clear,
    /// i.e. the apex needed to get over what is ahead. 0 when every probe
    /// is blocked.
    pub fn obstacle_height<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        body: &KinematicBody,
        facing_right: bool,
    ) -> f32 {
        let dir = facing_sign(facing_right);
        let front = body.position.x + dir * body.half_width();

        let mut heights = self.tuning.obstacle_probe_heights.clone();
        heights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        heights
            .into_iter()
            .find(|h| {
                self.first_solid(
                    world,
                    Vec2::new(front, body.position.y + h),
                    Vec2::new(dir, 0.0),
                    self.tuning.obstacle_ray_distance,
                    self.layers.obstacle,
                )
                .is_none()
            })
            .unwrap_or(0.0)
    }

    /// First scan offset ahead with no ground below it (where the platform
    /// ends). 0 when the ground continues through the whole scan.
    pub fn edge_distance<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        body: &KinematicBody,
        facing_right: bool,
    ) -> f32 {
        let dir = facing_sign(facing_right);
        let start = self.tuning.edge_scan_start;
        let span = self.tuning.edge_scan_end - start;
        let mut step = self.tuning.edge_scan_step;
        if step.is_nan() || step <= 0.0 || span.is_nan() || span < 0.0 {
            return 0.0;
        }

        // Too fine a step is widened so the capped scan still covers the span
        let mut samples = ((span + 1e-4) / step).floor() as usize + 1;
        if samples > MAX_EDGE_SCAN_SAMPLES {
            samples = MAX_EDGE_SCAN_SAMPLES;
            step = span / (samples - 1) as f32;
        }

        (0..samples)
            .map(|i| start + i as f32 * step)
            .find(|d| !self.has_ground_below(world, body.position.x + dir * d, body.position.y))
            .unwrap_or(0.0)
    }

    /// Ladder volume overlapping the body (triggers count here).
    /// With several, the one reaching highest wins.
    pub fn ladder<W: SpatialQuery + ?Sized>(&self, world: &W, body: &KinematicBody) -> Option<Aabb> {
        let aabb = body.aabb();
        let half = (aabb.max - aabb.min) / 2.0;
        world
            .probe_area(aabb.min + half, half, self.layers.ladder)
            .into_iter()
            .filter(|hit| Some(hit.collider) != self.self_collider)
            .map(|hit| hit.bounds)
            .max_by(|a, b| a.max.y.partial_cmp(&b.max.y).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn is_target_above(&self, body: &KinematicBody, target: Vec2) -> bool {
        target.y > body.position.y + self.tuning.target_above_threshold
    }

    /// Target lies past whatever the forward probes are hitting
    pub fn is_target_beyond_obstacle<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        body: &KinematicBody,
        facing_right: bool,
        target: Vec2,
    ) -> bool {
        let ahead = facing_sign(facing_right) * (target.x - body.position.x);
        let reach = self
            .obstacle_distance(world, body, facing_right)
            .unwrap_or(self.tuning.obstacle_area_depth);
        ahead > body.half_width() + reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{CountingQuery, LevelGeometry};

    fn sensors() -> EnvironmentSensors {
        EnvironmentSensors::new(&SensorTuning::default(), SurfaceLayers::default())
    }

    fn floor() -> LevelGeometry {
        let mut geo = LevelGeometry::new();
        geo.add_solid(Vec2::new(-20.0, -1.0), Vec2::new(5.0, 0.0), LayerMask::GROUND);
        geo
    }

    fn floor_with_block(height: f32) -> LevelGeometry {
        let mut geo = floor();
        geo.add_solid(Vec2::new(1.0, 0.0), Vec2::new(1.5, height), LayerMask::WALL);
        geo
    }

    #[test]
    fn test_grounded_on_floor_only() {
        let s = sensors();
        let geo = floor();
        assert!(s.is_grounded(&geo, &KinematicBody::at(Vec2::ZERO)));
        assert!(s.is_grounded(&geo, &KinematicBody::at(Vec2::new(0.0, 0.08))));
        assert!(!s.is_grounded(&geo, &KinematicBody::at(Vec2::new(0.0, 0.5))));
    }

    #[test]
    fn test_grounded_ignores_triggers_and_self() {
        let s = sensors();
        let mut geo = LevelGeometry::new();
        geo.add_trigger(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 0.0), LayerMask::GROUND);
        assert!(!s.is_grounded(&geo, &KinematicBody::at(Vec2::ZERO)));

        let own = geo.add_solid(Vec2::new(-0.4, -0.5), Vec2::new(0.4, 0.0), LayerMask::GROUND);
        assert!(s.is_grounded(&geo, &KinematicBody::at(Vec2::ZERO)));
        let s = s.with_self_collider(own);
        assert!(!s.is_grounded(&geo, &KinematicBody::at(Vec2::ZERO)));
    }

    #[test]
    fn test_missing_ground_check_point_uses_feet() {
        let tuning = SensorTuning {
            ground_check_point: None,
            ..Default::default()
        };
        let s = EnvironmentSensors::new(&tuning, SurfaceLayers::default());
        assert!(s.is_grounded(&floor(), &KinematicBody::at(Vec2::ZERO)));
    }

    #[test]
    fn test_obstacle_ahead_respects_facing() {
        let s = sensors();
        let geo = floor_with_block(1.2);
        let body = KinematicBody::at(Vec2::ZERO);
        assert!(s.is_obstacle_ahead(&geo, &body, true));
        assert!(!s.is_obstacle_ahead(&geo, &body, false));
        assert!((s.obstacle_distance(&geo, &body, true).unwrap() - 0.6).abs() < 1e-4);
    }

    #[test]
    fn test_obstacle_area_catches_low_step() {
        let s = sensors();
        let mut geo = floor();
        // Below the forward ray, inside the area query
        geo.add_solid(Vec2::new(0.5, 0.0), Vec2::new(0.9, 0.3), LayerMask::WALL);
        assert!(s.is_obstacle_ahead(&geo, &KinematicBody::at(Vec2::ZERO), true));
    }

    #[test]
    fn test_obstacle_height_probes() {
        let s = sensors();
        let body = KinematicBody::at(Vec2::ZERO);
        assert_eq!(s.obstacle_height(&floor_with_block(1.2), &body, true), 1.5);
        // Exactly on a probe height: that probe grazes the top and is clear
        assert_eq!(s.obstacle_height(&floor_with_block(2.0), &body, true), 2.0);
        // Taller than every probe
        assert_eq!(s.obstacle_height(&floor_with_block(3.0), &body, true), 0.0);
    }

    #[test]
    fn test_edge_ahead_and_distance() {
        let s = sensors();
        let geo = floor();
        let middle = KinematicBody::at(Vec2::new(-5.0, 0.0));
        assert!(!s.is_edge_ahead(&geo, &middle, true));
        assert_eq!(s.edge_distance(&geo, &middle, true), 0.0);

        let near_end = KinematicBody::at(Vec2::new(4.4, 0.0));
        assert!(s.is_edge_ahead(&geo, &near_end, true));
        assert!(!s.is_edge_ahead(&geo, &near_end, false));
        assert_eq!(s.edge_distance(&geo, &near_end, true), 1.0);
        assert_eq!(s.edge_distance(&geo, &near_end, false), 0.0);
    }

    #[test]
    fn test_edge_scan_is_capped_for_tiny_steps() {
        let tuning = SensorTuning {
            edge_scan_step: 1e-9,
            ..Default::default()
        };
        let s = EnvironmentSensors::new(&tuning, SurfaceLayers::default());
        let geo = floor();

        // Ground all the way: the whole capped scan runs and finds nothing
        let counting = CountingQuery::new(&geo);
        let middle = KinematicBody::at(Vec2::new(-10.0, 0.0));
        assert_eq!(s.edge_distance(&counting, &middle, true), 0.0);
        assert_eq!(counting.probes.get(), MAX_EDGE_SCAN_SAMPLES);

        // The widened step still reaches the platform end
        let near_end = KinematicBody::at(Vec2::new(4.4, 0.0));
        let distance = s.edge_distance(&geo, &near_end, true);
        assert!(distance > 0.6 && distance < 0.7, "distance = {distance}");
    }

    #[test]
    fn test_edge_scan_rejects_bad_steps() {
        let geo = floor();
        let near_end = KinematicBody::at(Vec2::new(4.4, 0.0));
        for step in [0.0, -0.5, f32::NAN] {
            let tuning = SensorTuning {
                edge_scan_step: step,
                ..Default::default()
            };
            let s = EnvironmentSensors::new(&tuning, SurfaceLayers::default());
            assert_eq!(s.edge_distance(&geo, &near_end, true), 0.0);
        }
    }

    #[test]
    fn test_ladder_detection_reports_top() {
        let s = sensors();
        let mut geo = floor();
        geo.add_trigger(Vec2::new(2.5, 0.0), Vec2::new(3.5, 3.0), LayerMask::LADDER);
        assert!(s.ladder(&geo, &KinematicBody::at(Vec2::ZERO)).is_none());
        let ladder = s.ladder(&geo, &KinematicBody::at(Vec2::new(2.6, 0.0))).unwrap();
        assert_eq!(ladder.max.y, 3.0);
    }

    #[test]
    fn test_target_relations() {
        let s = sensors();
        let geo = floor_with_block(3.0);
        let body = KinematicBody::at(Vec2::ZERO);
        assert!(s.is_target_above(&body, Vec2::new(0.0, 1.5)));
        assert!(!s.is_target_above(&body, Vec2::new(0.0, 0.9)));
        assert!(s.is_target_beyond_obstacle(&geo, &body, true, Vec2::new(4.0, 0.0)));
        assert!(!s.is_target_beyond_obstacle(&geo, &body, true, Vec2::new(0.8, 0.0)));
    }
}
