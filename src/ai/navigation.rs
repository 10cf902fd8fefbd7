//! Waypoint graph - hand-placed navigation nodes for platform navigation
//!
//! Level design places typed waypoints (ladders, jump points, platform edges)
//! and connects them. The graph is built once per level and is read-only
//! while agents are pathing; a level change replaces it wholesale.

use bevy::log::{debug, info, warn};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// Index of a waypoint inside its graph
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaypointId(pub usize);

impl std::fmt::Display for WaypointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of a waypoint in the level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaypointType {
    #[default]
    Standard,
    LadderBottom,
    LadderTop,
    JumpPoint,
    LandingPoint,
    /// Top of a drop-off. Only connects downward to its EdgeBottom.
    EdgeTop,
    /// Landing spot below an EdgeTop. Never connects back up.
    EdgeBottom,
}

/// A typed, positioned node in the navigation graph
#[derive(Clone, Debug)]
pub struct Waypoint {
    pub id: WaypointId,
    pub position: Vec2,
    pub waypoint_type: WaypointType,
    /// Outgoing connections, in insertion order
    pub connections: Vec<WaypointId>,
    /// Paired counterpart (ladder bottom/top, edge top/bottom)
    pub linked_waypoint: Option<WaypointId>,
    /// Multiplies the cost of edges that end at this waypoint
    pub cost_modifier: f32,
    pub allow_downward_only: bool,
}

impl Waypoint {
    pub fn new(id: WaypointId, position: Vec2, waypoint_type: WaypointType) -> Self {
        Self {
            id,
            position,
            waypoint_type,
            connections: Vec::new(),
            linked_waypoint: None,
            cost_modifier: 1.0,
            allow_downward_only: waypoint_type == WaypointType::EdgeTop,
        }
    }

    pub fn connects_to(&self, other: WaypointId) -> bool {
        self.connections.contains(&other)
    }
}

/// Owns every waypoint of a level
#[derive(Clone, Debug, Default)]
pub struct WaypointGraph {
    waypoints: Vec<Waypoint>,
}

impl WaypointGraph {
    /// Wrap pre-built waypoints without repairing them. Invalid edges are
    /// reported here and skipped later by the search.
    pub fn from_waypoints(waypoints: Vec<Waypoint>) -> Self {
        let graph = Self { waypoints };
        for err in graph.validate() {
            warn!("Waypoint graph: {}", err);
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, id: WaypointId) -> Option<&Waypoint> {
        self.waypoints.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.waypoints.iter().map(|w| w.connections.len()).sum()
    }

    /// Closest waypoint to a position (ties go to the lower id)
    pub fn nearest(&self, position: Vec2) -> Option<&Waypoint> {
        self.waypoints.iter().min_by(|a, b| {
            a.position
                .distance_squared(position)
                .partial_cmp(&b.position.distance_squared(position))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        })
    }

    /// Waypoints within `radius`, optionally of one type, nearest first
    pub fn in_radius(
        &self,
        position: Vec2,
        radius: f32,
        type_filter: Option<WaypointType>,
    ) -> Vec<&Waypoint> {
        let radius_sq = radius * radius;
        let mut found: Vec<&Waypoint> = self
            .waypoints
            .iter()
            .filter(|w| type_filter.is_none_or(|t| w.waypoint_type == t))
            .filter(|w| w.position.distance_squared(position) <= radius_sq)
            .collect();
        sort_by_distance(&mut found, position);
        found
    }

    /// Every waypoint, nearest first
    pub fn by_distance(&self, position: Vec2) -> Vec<&Waypoint> {
        let mut all: Vec<&Waypoint> = self.waypoints.iter().collect();
        sort_by_distance(&mut all, position);
        all
    }

    /// Smallest cost modifier in the graph (1.0 for an empty graph)
    pub fn min_cost_modifier(&self) -> f32 {
        self.waypoints
            .iter()
            .map(|w| w.cost_modifier.max(0.0))
            .fold(1.0_f32, f32::min)
    }

    /// Check structural invariants without changing anything
    pub fn validate(&self) -> Vec<NavError> {
        let mut errors = Vec::new();
        for from in &self.waypoints {
            for &to_id in &from.connections {
                let Some(to) = self.get(to_id) else {
                    errors.push(NavError::InvalidGraphEdge {
                        from: from.id.0,
                        to: to_id.0,
                        reason: "dangling connection",
                    });
                    continue;
                };
                if let Some(reason) = edge_violation(from, to) {
                    errors.push(NavError::InvalidGraphEdge {
                        from: from.id.0,
                        to: to.id.0,
                        reason,
                    });
                }
            }
        }
        errors
    }
}

fn sort_by_distance(waypoints: &mut [&Waypoint], position: Vec2) {
    waypoints.sort_by(|a, b| {
        a.position
            .distance_squared(position)
            .partial_cmp(&b.position.distance_squared(position))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Structural rule broken by the edge from -> to, if any
pub(crate) fn edge_violation(from: &Waypoint, to: &Waypoint) -> Option<&'static str> {
    use WaypointType::*;
    if from.id == to.id {
        return Some("self connection");
    }
    match (from.waypoint_type, to.waypoint_type) {
        (EdgeBottom, EdgeTop) => Some("edge bottom cannot lead back up to an edge top"),
        (EdgeTop, EdgeBottom) if from.position.y <= to.position.y => {
            Some("edge top must be strictly above its edge bottom")
        }
        _ => None,
    }
}

/// Administrative construction of a `WaypointGraph`
#[derive(Default)]
pub struct WaypointGraphBuilder {
    waypoints: Vec<Waypoint>,
}

impl WaypointGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_waypoint(&mut self, position: Vec2, waypoint_type: WaypointType) -> WaypointId {
        let id = WaypointId(self.waypoints.len());
        self.waypoints.push(Waypoint::new(id, position, waypoint_type));
        id
    }

    fn waypoint_mut(&mut self, id: WaypointId) -> Result<&mut Waypoint> {
        self.waypoints
            .get_mut(id.0)
            .ok_or_else(|| NavError::UnknownWaypoint(id.to_string()))
    }

    fn waypoint(&self, id: WaypointId) -> Result<&Waypoint> {
        self.waypoints
            .get(id.0)
            .ok_or_else(|| NavError::UnknownWaypoint(id.to_string()))
    }

    /// Negative modifiers are clamped to zero
    pub fn set_cost_modifier(&mut self, id: WaypointId, modifier: f32) -> Result<()> {
        self.waypoint_mut(id)?.cost_modifier = modifier.max(0.0);
        Ok(())
    }

    pub fn set_allow_downward_only(&mut self, id: WaypointId, allow: bool) -> Result<()> {
        self.waypoint_mut(id)?.allow_downward_only = allow;
        Ok(())
    }

    /// Connect two waypoints. Symmetric, except EdgeTop -> EdgeBottom which
    /// is one-way. EdgeBottom -> EdgeTop is rejected.
    pub fn connect(&mut self, a: WaypointId, b: WaypointId) -> Result<()> {
        let from = self.waypoint(a)?;
        let to = self.waypoint(b)?;
        if let Some(reason) = edge_violation(from, to) {
            return Err(NavError::InvalidGraphEdge {
                from: a.0,
                to: b.0,
                reason,
            });
        }

        let one_way = from.waypoint_type == WaypointType::EdgeTop
            && to.waypoint_type == WaypointType::EdgeBottom;

        push_unique(&mut self.waypoint_mut(a)?.connections, b);
        if !one_way {
            push_unique(&mut self.waypoint_mut(b)?.connections, a);
        }
        Ok(())
    }

    /// Pair two waypoints as counterparts (ladder bottom/top, edge top/bottom)
    pub fn link(&mut self, a: WaypointId, b: WaypointId) -> Result<()> {
        self.waypoint(a)?;
        self.waypoint(b)?;
        self.waypoint_mut(a)?.linked_waypoint = Some(b);
        self.waypoint_mut(b)?.linked_waypoint = Some(a);
        Ok(())
    }

    pub fn build(self) -> WaypointGraph {
        let graph = WaypointGraph {
            waypoints: self.waypoints,
        };
        info!(
            "Waypoint graph built: {} waypoints, {} connections",
            graph.len(),
            graph.edge_count()
        );
        for wp in graph.iter() {
            debug!(
                "  {} {:?} @ ({:.2}, {:.2}) -> {:?}",
                wp.id, wp.waypoint_type, wp.position.x, wp.position.y, wp.connections
            );
        }
        graph
    }
}

fn push_unique(list: &mut Vec<WaypointId>, id: WaypointId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder_and_edge() -> (WaypointGraphBuilder, [WaypointId; 4]) {
        let mut b = WaypointGraphBuilder::new();
        let lb = b.add_waypoint(Vec2::new(0.0, 0.0), WaypointType::LadderBottom);
        let lt = b.add_waypoint(Vec2::new(0.0, 3.0), WaypointType::LadderTop);
        let et = b.add_waypoint(Vec2::new(2.0, 3.0), WaypointType::EdgeTop);
        let eb = b.add_waypoint(Vec2::new(2.5, 0.0), WaypointType::EdgeBottom);
        (b, [lb, lt, et, eb])
    }

    #[test]
    fn test_connections_are_symmetric() {
        let (mut b, [lb, lt, ..]) = ladder_and_edge();
        b.connect(lb, lt).unwrap();
        b.link(lb, lt).unwrap();
        let g = b.build();
        assert!(g.get(lb).unwrap().connects_to(lt));
        assert!(g.get(lt).unwrap().connects_to(lb));
        assert_eq!(g.get(lt).unwrap().linked_waypoint, Some(lb));
    }

    #[test]
    fn test_edge_top_to_bottom_is_one_way() {
        let (mut b, [_, _, et, eb]) = ladder_and_edge();
        b.connect(et, eb).unwrap();
        let g = b.build();
        assert!(g.get(et).unwrap().connects_to(eb));
        assert!(!g.get(eb).unwrap().connects_to(et));
        assert!(g.get(et).unwrap().allow_downward_only);
    }

    #[test]
    fn test_edge_bottom_to_top_rejected() {
        let (mut b, [_, _, et, eb]) = ladder_and_edge();
        let err = b.connect(eb, et).unwrap_err();
        assert!(matches!(err, NavError::InvalidGraphEdge { .. }));
    }

    #[test]
    fn test_edge_pair_height_invariant() {
        let mut b = WaypointGraphBuilder::new();
        let et = b.add_waypoint(Vec2::new(0.0, 1.0), WaypointType::EdgeTop);
        let eb = b.add_waypoint(Vec2::new(1.0, 1.0), WaypointType::EdgeBottom);
        assert!(b.connect(et, eb).is_err());
    }

    #[test]
    fn test_unknown_waypoint() {
        let mut b = WaypointGraphBuilder::new();
        let a = b.add_waypoint(Vec2::ZERO, WaypointType::Standard);
        assert!(matches!(
            b.connect(a, WaypointId(9)),
            Err(NavError::UnknownWaypoint(_))
        ));
    }

    #[test]
    fn test_nearest_and_radius_queries() {
        let (b, [lb, lt, et, eb]) = ladder_and_edge();
        let g = b.build();
        assert_eq!(g.nearest(Vec2::new(0.2, 2.5)).unwrap().id, lt);
        // Nearest first; the edge top at ~3.6 is outside
        let near: Vec<_> = g
            .in_radius(Vec2::new(0.0, 0.0), 3.2, None)
            .iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(near, vec![lb, eb, lt]);
        let tops = g.in_radius(Vec2::new(0.0, 0.0), 10.0, Some(WaypointType::EdgeTop));
        assert_eq!(tops.len(), 1);
        assert_eq!(tops[0].id, et);
        assert!(WaypointGraph::default().nearest(Vec2::ZERO).is_none());
    }

    #[test]
    fn test_validate_reports_dangling_and_bad_pairs() {
        let mut a = Waypoint::new(WaypointId(0), Vec2::ZERO, WaypointType::EdgeBottom);
        let b = Waypoint::new(WaypointId(1), Vec2::new(0.0, 2.0), WaypointType::EdgeTop);
        a.connections = vec![WaypointId(1), WaypointId(7)];
        let g = WaypointGraph::from_waypoints(vec![a, b]);
        assert_eq!(g.validate().len(), 2);
    }

    #[test]
    fn test_cost_modifier_clamped() {
        let mut b = WaypointGraphBuilder::new();
        let a = b.add_waypoint(Vec2::ZERO, WaypointType::Standard);
        b.set_cost_modifier(a, -2.0).unwrap();
        let g = b.build();
        assert_eq!(g.min_cost_modifier(), 0.0);
    }
}
