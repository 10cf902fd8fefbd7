//! A* pathfinding over the waypoint graph
//!
//! Edge costs are Euclidean length scaled by the destination's cost modifier,
//! cheaper for one-way drops and dearer for climbs. The heuristic is scaled
//! down by the cheapest possible multiplier so it never overestimates.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy::log::debug;
use bevy::prelude::*;

use crate::ai::navigation::{Waypoint, WaypointGraph, WaypointId, WaypointType, edge_violation};
use crate::tuning::PathCostTuning;

/// Node in the A* search priority queue
#[derive(Clone, Copy)]
struct SearchNode {
    index: usize,
    /// Cost from start (g-score)
    g_cost: f32,
    /// g + h
    f_cost: f32,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; equal f breaks toward the lower id
        other
            .f_cost
            .partial_cmp(&self.f_cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Result of pathfinding. Empty when no path exists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathResult {
    /// Waypoint positions from start to goal
    pub points: Vec<Vec2>,
    pub waypoints: Vec<WaypointId>,
    pub total_cost: f32,
}

impl PathResult {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// Cost of travelling `from -> to`, or `None` when the edge is not
/// traversable (structural violation or upward move from a downward-only
/// waypoint).
pub fn edge_cost(from: &Waypoint, to: &Waypoint, costs: &PathCostTuning) -> Option<f32> {
    if edge_violation(from, to).is_some() {
        return None;
    }

    let rise = to.position.y - from.position.y;
    if from.allow_downward_only && rise > costs.climb_threshold_y {
        return None;
    }

    let mut cost = from.position.distance(to.position) * to.cost_modifier.max(0.0);
    if from.waypoint_type == WaypointType::EdgeTop && to.waypoint_type == WaypointType::EdgeBottom {
        cost *= costs.jump_down_cost_factor;
    } else if rise > costs.climb_threshold_y {
        cost *= costs.climb_up_cost_factor;
    }

    cost.is_finite().then_some(cost)
}

/// Euclidean distance scaled so it stays below any real edge cost
fn heuristic(from: Vec2, to: Vec2, scale: f32) -> f32 {
    from.distance(to) * scale
}

/// Find the cheapest path between two waypoints using A*
pub fn find_path(
    graph: &WaypointGraph,
    start: WaypointId,
    goal: WaypointId,
    costs: &PathCostTuning,
) -> PathResult {
    let (Some(start_wp), Some(goal_wp)) = (graph.get(start), graph.get(goal)) else {
        return PathResult::default();
    };

    if start == goal {
        return PathResult {
            points: vec![start_wp.position],
            waypoints: vec![start],
            total_cost: 0.0,
        };
    }

    let scale = costs.jump_down_cost_factor.clamp(0.0, 1.0) * graph.min_cost_modifier();
    let goal_pos = goal_wp.position;

    let mut open_set = BinaryHeap::new();
    let mut came_from: Vec<Option<usize>> = vec![None; graph.len()];
    let mut g_scores = vec![f32::INFINITY; graph.len()];
    let mut closed = vec![false; graph.len()];

    g_scores[start.0] = 0.0;
    open_set.push(SearchNode {
        index: start.0,
        g_cost: 0.0,
        f_cost: heuristic(start_wp.position, goal_pos, scale),
    });

    while let Some(current) = open_set.pop() {
        if closed[current.index] {
            continue;
        }
        if current.index == goal.0 {
            return reconstruct_path(graph, &came_from, start.0, goal.0, current.g_cost);
        }
        closed[current.index] = true;

        let Some(from) = graph.get(WaypointId(current.index)) else {
            continue;
        };

        for &next_id in &from.connections {
            let Some(to) = graph.get(next_id) else {
                debug!("Skipping dangling connection {} -> {}", from.id, next_id);
                continue;
            };
            if closed[next_id.0] {
                continue;
            }
            let Some(step) = edge_cost(from, to, costs) else {
                debug!("Skipping untraversable edge {} -> {}", from.id, next_id);
                continue;
            };

            let tentative_g = current.g_cost + step;
            if tentative_g < g_scores[next_id.0] {
                g_scores[next_id.0] = tentative_g;
                came_from[next_id.0] = Some(current.index);
                open_set.push(SearchNode {
                    index: next_id.0,
                    g_cost: tentative_g,
                    f_cost: tentative_g + heuristic(to.position, goal_pos, scale),
                });
            }
        }
    }

    PathResult::default()
}

fn reconstruct_path(
    graph: &WaypointGraph,
    came_from: &[Option<usize>],
    start: usize,
    goal: usize,
    total_cost: f32,
) -> PathResult {
    let mut ids = vec![WaypointId(goal)];
    let mut current = goal;
    while current != start {
        match came_from[current] {
            Some(parent) => {
                ids.push(WaypointId(parent));
                current = parent;
            }
            None => return PathResult::default(),
        }
    }
    ids.reverse();

    let points = ids
        .iter()
        .filter_map(|id| graph.get(*id).map(|w| w.position))
        .collect();

    PathResult {
        points,
        waypoints: ids,
        total_cost,
    }
}
