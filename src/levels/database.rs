//! Level definitions - parsing and building

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use bevy::log::{info, warn};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ai::{WaypointGraph, WaypointGraphBuilder, WaypointId, WaypointType};
use crate::error::{NavError, Result};
use crate::world::{LayerMask, LevelGeometry};

/// Axis-aligned collider in level data
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColliderDef {
    /// Layer name: ground, obstacle, ladder or wall
    pub layer: String,
    pub min: [f32; 2],
    pub max: [f32; 2],
    #[serde(default)]
    pub trigger: bool,
}

/// Waypoint in level data, referenced by its string id
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaypointDef {
    pub id: String,
    #[serde(rename = "type", default)]
    pub waypoint_type: WaypointType,
    pub position: [f32; 2],
    #[serde(default = "default_cost_modifier")]
    pub cost_modifier: f32,
    /// Overrides the per-type default (on for EdgeTop)
    #[serde(default)]
    pub allow_downward_only: Option<bool>,
}

fn default_cost_modifier() -> f32 {
    1.0
}

/// Single level: geometry plus its hand-placed waypoint graph
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelDef {
    pub name: String,
    pub colliders: Vec<ColliderDef>,
    pub waypoints: Vec<WaypointDef>,
    /// `[from, to]` pairs, same direction rules as `WaypointGraphBuilder::connect`
    pub connections: Vec<[String; 2]>,
    /// Counterpart pairs (ladder bottom/top, edge top/bottom)
    pub links: Vec<[String; 2]>,
}

/// Built level, ready for simulation
pub struct BuiltLevel {
    pub geometry: LevelGeometry,
    pub graph: WaypointGraph,
    /// Waypoint ids by their level-file name
    pub waypoint_ids: HashMap<String, WaypointId>,
    /// Connections that were rejected and skipped
    pub warnings: Vec<NavError>,
}

impl LevelDef {
    /// Load a level from a `.toml` or `.json` file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<LevelDef> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| NavError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let level: LevelDef = if path.extension().is_some_and(|e| e == "toml") {
            toml::from_str(&content).map_err(|e| NavError::parse(path.display().to_string(), e))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| NavError::parse(path.display().to_string(), e))?
        };
        info!(
            "Loaded level '{}' from {} ({} colliders, {} waypoints)",
            level.name,
            path.display(),
            level.colliders.len(),
            level.waypoints.len()
        );
        Ok(level)
    }

    pub fn geometry(&self) -> Result<LevelGeometry> {
        let mut geometry = LevelGeometry::new();
        for def in &self.colliders {
            let layers = LayerMask::from_name(&def.layer).ok_or_else(|| {
                NavError::parse(
                    format!("level '{}'", self.name),
                    format!("unknown collider layer '{}'", def.layer),
                )
            })?;
            let (min, max) = (Vec2::from(def.min), Vec2::from(def.max));
            if def.trigger {
                geometry.add_trigger(min, max, layers);
            } else {
                geometry.add_solid(min, max, layers);
            }
        }
        Ok(geometry)
    }

    /// Build geometry and graph. Unknown layers and duplicate or unknown
    /// waypoint ids are errors; edges breaking the graph rules are skipped
    /// and reported in `warnings`.
    pub fn build(&self) -> Result<BuiltLevel> {
        let geometry = self.geometry()?;

        let mut builder = WaypointGraphBuilder::new();
        let mut ids = HashMap::new();
        for def in &self.waypoints {
            let id = builder.add_waypoint(Vec2::from(def.position), def.waypoint_type);
            if ids.insert(def.id.clone(), id).is_some() {
                return Err(NavError::parse(
                    format!("level '{}'", self.name),
                    format!("duplicate waypoint id '{}'", def.id),
                ));
            }
            builder.set_cost_modifier(id, def.cost_modifier)?;
            if let Some(allow) = def.allow_downward_only {
                builder.set_allow_downward_only(id, allow)?;
            }
        }

        let lookup = |name: &str| {
            ids.get(name)
                .copied()
                .ok_or_else(|| NavError::UnknownWaypoint(name.to_string()))
        };

        let mut warnings = Vec::new();
        for [from, to] in &self.connections {
            let (a, b) = (lookup(from)?, lookup(to)?);
            if let Err(err) = builder.connect(a, b) {
                warn!("Level '{}': skipping {} -> {}: {}", self.name, from, to, err);
                warnings.push(err);
            }
        }
        for [a, b] in &self.links {
            builder.link(lookup(a)?, lookup(b)?)?;
        }

        Ok(BuiltLevel {
            geometry,
            graph: builder.build(),
            waypoint_ids: ids,
            warnings,
        })
    }
}
