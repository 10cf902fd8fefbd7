//! Route arbitration - direct line vs. graph route
//!
//! The direct line is sampled for obstacles and costed the same way as a
//! graph route (length, climb, obstacle crossings). The graph route wins
//! when the direct line is blocked or when it is clearly cheaper.

use std::collections::HashSet;
use std::sync::Arc;

use bevy::log::{debug, warn};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ai::navigation::{Waypoint, WaypointGraph, WaypointId};
use crate::ai::pathfinding::{PathResult, find_path};
use crate::constants::MAX_DIRECT_SAMPLES;
use crate::helpers::{polyline_height_delta, polyline_length, segment_progress};
use crate::tuning::{PathCostTuning, RouteTuning};
use crate::world::{LayerMask, SpatialQuery};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteChoice {
    #[default]
    Direct,
    Alternate,
}

/// Outcome of one arbitration
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteDecision {
    pub choice: RouteChoice,
    pub direct_blocked: bool,
    pub direct_cost: f32,
    /// `None` when the graph offered no route
    pub alternate_cost: Option<f32>,
    /// Alternate route points: waypoints then the target
    pub route: Vec<Vec2>,
}

impl RouteDecision {
    /// Something other than a blocked line with no graph route
    pub fn is_reachable(&self) -> bool {
        !self.direct_blocked || self.alternate_cost.is_some()
    }
}

/// Pick a route from already-computed costs
pub fn choose_route(
    direct_blocked: bool,
    direct_cost: f32,
    alternate_cost: Option<f32>,
    preference_threshold: f32,
) -> RouteChoice {
    match alternate_cost {
        Some(alt) if direct_blocked || alt < direct_cost * preference_threshold => {
            RouteChoice::Alternate
        }
        _ => RouteChoice::Direct,
    }
}

/// Does the segment (lifted off the floor) hit an obstacle?
fn segment_hits<W: SpatialQuery + ?Sized>(world: &W, a: Vec2, b: Vec2, mask: LayerMask) -> bool {
    let delta = b - a;
    let length = delta.length();
    if length <= f32::EPSILON {
        return false;
    }
    world
        .probe_ray(a, delta, length, mask)
        .iter()
        .any(|hit| !hit.is_trigger)
}

/// Samples along the lifted line, plus a line-of-sight ray
pub fn is_direct_blocked<W: SpatialQuery + ?Sized>(
    world: &W,
    from: Vec2,
    to: Vec2,
    tuning: &RouteTuning,
    mask: LayerMask,
) -> bool {
    let lift = Vec2::new(0.0, tuning.line_of_sight_lift);
    let (a, b) = (from + lift, to + lift);
    let steps = if tuning.sample_step > 0.0 {
        ((a.distance(b) / tuning.sample_step).ceil() as usize).clamp(1, MAX_DIRECT_SAMPLES)
    } else {
        1
    };

    let sampled = (0..=steps).any(|i| {
        let point = a.lerp(b, i as f32 / steps as f32);
        world
            .probe_area(point, Vec2::ZERO, mask)
            .iter()
            .any(|hit| !hit.is_trigger)
    });

    sampled || segment_hits(world, a, b, mask)
}

/// Segments of the lifted polyline that hit an obstacle
pub fn obstacle_crossings<W: SpatialQuery + ?Sized>(
    world: &W,
    points: &[Vec2],
    tuning: &RouteTuning,
    mask: LayerMask,
) -> usize {
    let lift = Vec2::new(0.0, tuning.line_of_sight_lift);
    points
        .windows(2)
        .filter(|w| segment_hits(world, w[0] + lift, w[1] + lift, mask))
        .count()
}

/// length·wL + heightΔ·wH + crossings·wO
pub fn path_cost<W: SpatialQuery + ?Sized>(
    world: &W,
    points: &[Vec2],
    tuning: &RouteTuning,
    mask: LayerMask,
) -> f32 {
    polyline_length(points) * tuning.weight_length
        + polyline_height_delta(points) * tuning.weight_height
        + obstacle_crossings(world, points, tuning, mask) as f32 * tuning.weight_obstacle
}

/// Per-agent arbiter. Holds the shared graph and throttles recomputation.
#[derive(Clone, Debug)]
pub struct RouteArbiter {
    graph: Arc<WaypointGraph>,
    tuning: RouteTuning,
    costs: PathCostTuning,
    obstacle_mask: LayerMask,
    last: Option<Evaluation>,
}

#[derive(Clone, Debug)]
struct Evaluation {
    agent: Vec2,
    target: Vec2,
    at: f32,
    decision: RouteDecision,
}

impl RouteArbiter {
    pub fn new(
        graph: Arc<WaypointGraph>,
        tuning: &RouteTuning,
        costs: &PathCostTuning,
        obstacle_mask: LayerMask,
    ) -> Self {
        Self {
            graph,
            tuning: tuning.clone(),
            costs: costs.clone(),
            obstacle_mask,
            last: None,
        }
    }

    pub fn graph(&self) -> &Arc<WaypointGraph> {
        &self.graph
    }

    pub fn last_decision(&self) -> Option<&RouteDecision> {
        self.last.as_ref().map(|e| &e.decision)
    }

    /// Forget the cached decision so the next evaluation recomputes
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    fn is_fresh(&self, agent: Vec2, target: Vec2, now: f32) -> bool {
        self.last.as_ref().is_some_and(|e| {
            e.agent.distance(agent) <= self.tuning.replan_min_delta
                && e.target.distance(target) <= self.tuning.replan_min_delta
                && now - e.at < self.tuning.replan_interval
        })
    }

    /// Throttled arbitration. Returns the cached decision while neither
    /// end has moved past the replan delta and the interval has not elapsed.
    pub fn evaluate<W: SpatialQuery + ?Sized>(
        &mut self,
        world: &W,
        agent: Vec2,
        target: Vec2,
        now: f32,
    ) -> (&RouteDecision, bool) {
        let recomputed = !self.is_fresh(agent, target, now);
        if recomputed {
            let decision = self.arbitrate(world, agent, target);
            debug!(
                "Route {:?}: direct {:.2}{}, alternate {:?}",
                decision.choice,
                decision.direct_cost,
                if decision.direct_blocked { " (blocked)" } else { "" },
                decision.alternate_cost
            );
            self.last = Some(Evaluation {
                agent,
                target,
                at: now,
                decision,
            });
        }
        let evaluation = self.last.get_or_insert_with(|| Evaluation {
            agent,
            target,
            at: now,
            decision: RouteDecision::default(),
        });
        (&evaluation.decision, recomputed)
    }

    /// Unthrottled arbitration
    pub fn arbitrate<W: SpatialQuery + ?Sized>(
        &self,
        world: &W,
        agent: Vec2,
        target: Vec2,
    ) -> RouteDecision {
        let mask = self.obstacle_mask;
        let direct_blocked = is_direct_blocked(world, agent, target, &self.tuning, mask);
        let direct_cost = path_cost(world, &[agent, target], &self.tuning, mask);

        let route: Vec<Vec2> = match self.plan_alternate(agent, target) {
            Some(path) => std::iter::once(agent)
                .chain(path.points)
                .chain(std::iter::once(target))
                .collect(),
            None => Vec::new(),
        };
        let alternate_cost = (!route.is_empty()).then(|| path_cost(world, &route, &self.tuning, mask));

        let choice = choose_route(
            direct_blocked,
            direct_cost,
            alternate_cost,
            self.tuning.preference_threshold,
        );

        RouteDecision {
            choice,
            direct_blocked,
            direct_cost,
            alternate_cost,
            // Drop the agent's own position
            route: route.into_iter().skip(1).collect(),
        }
    }

    /// Graph search with escalation: nearest pair, then an expanded radius,
    /// then the whole graph by distance. Capped at `max_search_attempts`.
    pub fn plan_alternate(&self, agent: Vec2, target: Vec2) -> Option<PathResult> {
        if self.graph.is_empty() {
            return None;
        }

        let radius = self.tuning.search_radius;
        let expanded = radius * self.tuning.search_radius_expansion.max(1.0);
        let ids = |v: Vec<&Waypoint>| -> Vec<WaypointId> {
            v.into_iter().map(|w| w.id).collect()
        };

        let stages: [(Vec<WaypointId>, Vec<WaypointId>); 3] = [
            (
                ids(self.graph.in_radius(agent, radius, None))
                    .into_iter()
                    .take(1)
                    .collect(),
                ids(self.graph.in_radius(target, radius, None))
                    .into_iter()
                    .take(1)
                    .collect(),
            ),
            (
                ids(self.graph.in_radius(agent, expanded, None)),
                ids(self.graph.in_radius(target, expanded, None)),
            ),
            (
                ids(self.graph.by_distance(agent)),
                ids(self.graph.by_distance(target)),
            ),
        ];

        let mut tried = HashSet::new();
        for (stage, (starts, goals)) in stages.iter().enumerate() {
            for &start in starts {
                for &goal in goals {
                    // A one-waypoint route only makes sense for the nearest pair
                    if stage > 0 && start == goal {
                        continue;
                    }
                    if !tried.insert((start, goal)) {
                        continue;
                    }
                    if tried.len() > self.tuning.max_search_attempts {
                        warn!(
                            "Route search budget ({}) exhausted between ({:.1}, {:.1}) and ({:.1}, {:.1})",
                            self.tuning.max_search_attempts, agent.x, agent.y, target.x, target.y
                        );
                        return None;
                    }
                    let path = find_path(&self.graph, start, goal, &self.costs);
                    if !path.is_empty() {
                        return Some(path);
                    }
                }
            }
        }
        None
    }
}

/// Route being followed point by point
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActiveRoute {
    points: Vec<Vec2>,
    next: usize,
}

impl ActiveRoute {
    /// Start following `points`, skipping leading points already reached
    /// or passed
    pub fn new(points: Vec<Vec2>, agent: Vec2, reach: Vec2) -> Self {
        let mut route = Self { points, next: 0 };
        route.advance(agent, reach);
        route
    }

    pub fn current(&self) -> Option<Vec2> {
        self.points.get(self.next).copied()
    }

    pub fn remaining(&self) -> &[Vec2] {
        self.points.get(self.next..).unwrap_or(&[])
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.points.len()
    }

    /// Step past every point that is within `reach` (per axis) or that the
    /// agent has already moved beyond toward the following point. The last
    /// point is only reached, never passed.
    pub fn advance(&mut self, agent: Vec2, reach: Vec2) {
        while let Some(point) = self.current() {
            let delta = (point - agent).abs();
            let reached = delta.x <= reach.x && delta.y <= reach.y;
            let passed = self
                .points
                .get(self.next + 1)
                .is_some_and(|&following| segment_progress(point, following, agent) > 0.0);
            if !(reached || passed) {
                break;
            }
            self.next += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::navigation::{WaypointGraphBuilder, WaypointType};
    use crate::world::{CountingQuery, LevelGeometry};

    fn arbiter(graph: WaypointGraph) -> RouteArbiter {
        RouteArbiter::new(
            Arc::new(graph),
            &RouteTuning::default(),
            &PathCostTuning::default(),
            LayerMask::OBSTACLE,
        )
    }

    /// Flat floor with three low walls between x=0 and x=8
    fn three_walls() -> LevelGeometry {
        let mut geo = LevelGeometry::new();
        geo.add_solid(Vec2::new(-20.0, -1.0), Vec2::new(20.0, 0.0), LayerMask::GROUND);
        for x in [2.0, 4.0, 6.0] {
            geo.add_solid(Vec2::new(x, 0.0), Vec2::new(x + 0.2, 1.0), LayerMask::WALL);
        }
        geo
    }

    /// Overhead walkway above the walls
    fn walkway() -> WaypointGraph {
        let mut b = WaypointGraphBuilder::new();
        let a = b.add_waypoint(Vec2::new(1.0, 1.0), WaypointType::Standard);
        let c = b.add_waypoint(Vec2::new(7.0, 1.0), WaypointType::Standard);
        b.connect(a, c).unwrap();
        b.build()
    }

    #[test]
    fn test_choose_route_threshold() {
        assert_eq!(choose_route(false, 10.0, Some(7.9), 0.8), RouteChoice::Alternate);
        // Cheaper, but not by enough
        assert_eq!(choose_route(false, 10.0, Some(8.5), 0.8), RouteChoice::Direct);
        assert_eq!(choose_route(true, 10.0, Some(50.0), 0.8), RouteChoice::Alternate);
        assert_eq!(choose_route(true, 10.0, None, 0.8), RouteChoice::Direct);
    }

    #[test]
    fn test_direct_line_blocked_by_walls() {
        let geo = three_walls();
        let tuning = RouteTuning::default();
        let (from, to) = (Vec2::ZERO, Vec2::new(8.0, 0.0));
        assert!(is_direct_blocked(&geo, from, to, &tuning, LayerMask::OBSTACLE));
        assert_eq!(obstacle_crossings(&geo, &[from, to], &tuning, LayerMask::OBSTACLE), 1);
        assert!(!is_direct_blocked(&geo, from, Vec2::new(1.5, 0.0), &tuning, LayerMask::OBSTACLE));
    }

    #[test]
    fn test_direct_sampling_is_capped() {
        let geo = three_walls();
        let tuning = RouteTuning {
            sample_step: 1e-9,
            ..Default::default()
        };

        let counting = CountingQuery::new(&geo);
        let far = Vec2::new(1.0e6, 0.0);
        assert!(is_direct_blocked(&counting, Vec2::ZERO, far, &tuning, LayerMask::OBSTACLE));
        // Samples at both ends plus the line-of-sight ray
        assert!(counting.probes.get() <= MAX_DIRECT_SAMPLES + 2);

        let counting = CountingQuery::new(&geo);
        let short = Vec2::new(1.5, 0.0);
        assert!(!is_direct_blocked(&counting, Vec2::ZERO, short, &tuning, LayerMask::OBSTACLE));
        assert_eq!(counting.probes.get(), MAX_DIRECT_SAMPLES + 2);
    }

    #[test]
    fn test_selects_cheaper_alternate_over_walls() {
        let geo = three_walls();
        let arb = arbiter(walkway());
        let decision = arb.arbitrate(&geo, Vec2::ZERO, Vec2::new(8.0, 0.0));
        assert!(decision.direct_blocked);
        assert_eq!(decision.choice, RouteChoice::Alternate);
        let alt = decision.alternate_cost.unwrap();
        assert!(alt < decision.direct_cost * 0.8);
        assert_eq!(decision.route.last(), Some(&Vec2::new(8.0, 0.0)));
        assert_eq!(decision.route.len(), 3);
    }

    #[test]
    fn test_falls_back_to_direct_without_graph_route() {
        let geo = three_walls();
        let arb = arbiter(WaypointGraph::default());
        let decision = arb.arbitrate(&geo, Vec2::ZERO, Vec2::new(8.0, 0.0));
        assert_eq!(decision.choice, RouteChoice::Direct);
        assert!(decision.route.is_empty());
        assert!(!decision.is_reachable());
    }

    #[test]
    fn test_throttled_evaluation_is_stable() {
        let geo = three_walls();
        let mut arb = arbiter(walkway());
        let target = Vec2::new(8.0, 0.0);
        let (first, recomputed) = arb.evaluate(&geo, Vec2::ZERO, target, 0.0);
        let first = first.clone();
        assert!(recomputed);
        for i in 1..10 {
            let now = i as f32 * 0.01;
            let (again, recomputed) = arb.evaluate(&geo, Vec2::new(0.05, 0.0), target, now);
            assert!(!recomputed);
            assert_eq!(*again, first);
        }
        let (_, recomputed) = arb.evaluate(&geo, Vec2::ZERO, target, 1.0);
        assert!(recomputed);
    }

    #[test]
    fn test_escalation_finds_distant_waypoints() {
        let geo = LevelGeometry::new();
        let mut b = WaypointGraphBuilder::new();
        // Far outside the normal search radius of both ends
        let a = b.add_waypoint(Vec2::new(0.0, 8.0), WaypointType::Standard);
        let c = b.add_waypoint(Vec2::new(10.0, 8.0), WaypointType::Standard);
        b.connect(a, c).unwrap();
        let arb = arbiter(b.build());
        assert!(arb.plan_alternate(Vec2::ZERO, Vec2::new(10.0, 0.0)).is_some());
        let decision = arb.arbitrate(&geo, Vec2::ZERO, Vec2::new(10.0, 0.0));
        assert!(decision.alternate_cost.is_some());
    }

    #[test]
    fn test_escalation_budget() {
        let mut b = WaypointGraphBuilder::new();
        for i in 0..10 {
            b.add_waypoint(Vec2::new(i as f32, 0.0), WaypointType::Standard);
        }
        let arb = arbiter(b.build());
        assert!(arb.plan_alternate(Vec2::ZERO, Vec2::new(9.0, 0.0)).is_none());
    }

    #[test]
    fn test_active_route_skips_passed_points() {
        let reach = Vec2::new(0.5, 1.0);
        let points = vec![Vec2::new(1.0, 0.0), Vec2::new(4.0, 0.0), Vec2::new(8.0, 0.0)];
        let mut route = ActiveRoute::new(points, Vec2::new(2.0, 0.0), reach);
        assert_eq!(route.current(), Some(Vec2::new(4.0, 0.0)));
        route.advance(Vec2::new(3.6, 0.0), reach);
        assert_eq!(route.current(), Some(Vec2::new(8.0, 0.0)));
        route.advance(Vec2::new(9.0, 0.0), reach);
        // The final point must be reached, not passed
        assert!(!route.is_finished());
        route.advance(Vec2::new(8.2, 0.0), reach);
        assert!(route.is_finished());
    }
}
