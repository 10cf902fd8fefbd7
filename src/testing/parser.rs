//! TOML test file parsing

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::levels::LevelDef;
use crate::tuning::NavTuning;

/// Complete test definition from TOML file
#[derive(Debug, Deserialize)]
pub struct TestDefinition {
    pub name: String,
    pub description: Option<String>,
    pub setup: TestSetup,
    #[serde(default)]
    pub input: Vec<FrameInput>,
    pub expect: TestExpectations,
}

/// Test setup: level, tuning overrides, agents and the shared target
#[derive(Debug, Deserialize)]
pub struct TestSetup {
    pub level: LevelDef,
    /// Any subset of the tuning tree; the rest keeps its defaults
    #[serde(default)]
    pub tuning: NavTuning,
    /// Initial target position, `None` for no target
    pub target: Option<[f32; 2]>,
    /// Minimum number of frames to run
    pub frames: Option<u64>,
    #[serde(default)]
    pub agents: Vec<AgentDef>,
}

/// Agent definition for spawning
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDef {
    #[serde(default = "default_agent_id")]
    pub id: String,
    pub position: [f32; 2],
    #[serde(default = "default_facing_right")]
    pub facing_right: bool,
    #[serde(default)]
    pub aggro: AggroDef,
}

fn default_agent_id() -> String {
    "agent".to_string()
}

fn default_facing_right() -> bool {
    true
}

/// Where an agent's aggro signal comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggroDef {
    /// Built-in range and line-of-sight check
    #[default]
    Local,
    Always,
    Never,
}

/// Collaborator calls applied before the given frame is simulated
#[derive(Debug, Clone, Deserialize)]
pub struct FrameInput {
    pub frame: u64,
    /// Agent id; `None` applies to every agent (ignored for `target`)
    pub agent: Option<String>,
    /// Move the shared target
    pub target: Option<[f32; 2]>,
    #[serde(default)]
    pub clear_target: bool,
    /// Pause navigation for this many seconds
    pub pause: Option<f32>,
    pub enabled: Option<bool>,
    /// External state override, e.g. "Falling"
    pub force_state: Option<String>,
}

/// Expected test outcomes
#[derive(Debug, Default, Deserialize)]
pub struct TestExpectations {
    #[serde(default)]
    pub sequence: Vec<ExpectedEvent>,
    /// Multiple state assertions at different frames (uses [[expect.state]] TOML syntax)
    #[serde(default)]
    pub state: Vec<StateAssertion>,
}

/// Expected navigation state entry, in order (gaps allowed)
#[derive(Debug, Deserialize)]
pub struct ExpectedEvent {
    pub event: String,
    pub agent: Option<String>,
    pub frame_min: Option<u64>,
    pub frame_max: Option<u64>,
}

/// State assertion after simulation
#[derive(Debug, Clone, Deserialize)]
pub struct StateAssertion {
    pub after_frame: u64,
    #[serde(default)]
    pub checks: Vec<String>,
}

/// Parse a test file from path
pub fn parse_test_file(path: &Path) -> Result<TestDefinition, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let toml = r#"
name = "Test"
[setup]
target = [5.0, 0.0]

[setup.level]
name = "flat"
[[setup.level.colliders]]
layer = "ground"
min = [-10.0, -1.0]
max = [10.0, 0.0]

[setup.tuning.movement]
move_speed = 2.0

[[setup.agents]]
position = [0.0, 0.0]
aggro = "always"

[[input]]
frame = 30
pause = 0.5

[expect]
sequence = [{ event = "Idle" }, { event = "Walking", frame_max = 2 }]
"#;
        let def: TestDefinition = toml::from_str(toml).unwrap();
        assert_eq!(def.name, "Test");
        assert_eq!(def.setup.level.colliders.len(), 1);
        assert_eq!(def.setup.tuning.movement.move_speed, 2.0);
        assert_eq!(def.setup.tuning.jump.jump_force, crate::constants::JUMP_FORCE);
        assert_eq!(def.setup.agents[0].id, "agent");
        assert_eq!(def.setup.agents[0].aggro, AggroDef::Always);
        assert!(def.setup.agents[0].facing_right);
        assert_eq!(def.input[0].pause, Some(0.5));
        assert_eq!(def.expect.sequence.len(), 2);
    }
}
