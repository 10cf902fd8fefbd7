//! Assertion checking for test expectations

use std::collections::HashMap;

use super::parser::{ExpectedEvent, StateAssertion};
use crate::ai::NavState;

/// Error when an assertion fails
#[derive(Debug)]
pub struct AssertionError {
    pub message: String,
    pub expected: String,
    pub actual: String,
}

impl std::fmt::Display for AssertionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n    Expected: {}\n    Actual: {}", self.message, self.expected, self.actual)
    }
}

/// State entry captured during the run
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub frame: u64,
    pub event_type: String,
    pub agent: String,
}

impl CapturedEvent {
    pub fn state_entered(frame: u64, agent: &str, state: NavState) -> Self {
        Self {
            frame,
            event_type: state.to_string(),
            agent: agent.to_string(),
        }
    }
}

/// Check if captured events match expected sequence
pub fn check_sequence(expected: &[ExpectedEvent], captured: &[CapturedEvent]) -> Result<(), AssertionError> {
    let mut captured_idx = 0;

    for (i, exp) in expected.iter().enumerate() {
        // Find matching event starting from current position
        let found = captured[captured_idx..].iter().enumerate().find(|(_, cap)| {
            cap.event_type == exp.event && exp.agent.as_ref().is_none_or(|a| *a == cap.agent)
        });

        match found {
            Some((offset, cap)) => {
                if let Some(min) = exp.frame_min
                    && cap.frame < min
                {
                    return Err(AssertionError {
                        message: format!("Event #{} '{}' occurred too early", i + 1, exp.event),
                        expected: format!("frame >= {}", min),
                        actual: format!("frame {}", cap.frame),
                    });
                }
                if let Some(max) = exp.frame_max
                    && cap.frame > max
                {
                    return Err(AssertionError {
                        message: format!("Event #{} '{}' occurred too late", i + 1, exp.event),
                        expected: format!("frame <= {}", max),
                        actual: format!("frame {}", cap.frame),
                    });
                }
                captured_idx += offset + 1;
            }
            None => {
                let agent_str = exp.agent.as_ref().map(|a| format!(" (agent: {})", a)).unwrap_or_default();
                return Err(AssertionError {
                    message: format!("Event #{} '{}'{} not found", i + 1, exp.event, agent_str),
                    expected: format!("'{}' event in sequence", exp.event),
                    actual: format!(
                        "events after position {}: {:?}",
                        captured_idx,
                        captured[captured_idx..].iter().map(|e| &e.event_type).collect::<Vec<_>>()
                    ),
                });
            }
        }
    }

    Ok(())
}

/// World state for assertions
pub struct WorldState {
    pub agents: HashMap<String, AgentState>,
}

pub struct AgentState {
    pub x: f32,
    pub y: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub gravity_scale: f32,
    pub state: NavState,
    pub facing_right: bool,
    pub grounded: bool,
    pub climbing: bool,
    pub enabled: bool,
    pub paused: bool,
}

/// Parse a check string into (path, operator, value)
fn parse_check(check: &str) -> Option<(&str, &str, &str)> {
    // Try operators in order of specificity (>= before >, etc.)
    for op in &[">=", "<=", "!=", "=", ">", "<"] {
        if let Some(idx) = check.find(op) {
            let path = check[..idx].trim();
            let value = check[idx + op.len()..].trim();
            return Some((path, op, value));
        }
    }
    None
}

/// Check state assertions against world state
pub fn check_state(assertion: &StateAssertion, state: &WorldState) -> Result<(), AssertionError> {
    for check in &assertion.checks {
        let (path, operator, expected_value) = parse_check(check).ok_or_else(|| AssertionError {
            message: format!("Invalid check syntax: {}", check),
            expected: "format: 'agent.property = value' or 'agent.property > value'".to_string(),
            actual: check.clone(),
        })?;

        let Some((agent_id, property)) = path.split_once('.') else {
            return Err(AssertionError {
                message: format!("Invalid check path: {}", path),
                expected: "agent.property".to_string(),
                actual: path.to_string(),
            });
        };

        let agent = state.agents.get(agent_id).ok_or_else(|| AssertionError {
            message: format!("Agent '{}' not found", agent_id),
            expected: format!("agent '{}'", agent_id),
            actual: format!("available: {:?}", state.agents.keys().collect::<Vec<_>>()),
        })?;

        match property {
            "x" => check_float_comparison(path, agent.x, operator, expected_value)?,
            "y" => check_float_comparison(path, agent.y, operator, expected_value)?,
            "velocity_x" => check_float_comparison(path, agent.velocity_x, operator, expected_value)?,
            "velocity_y" => check_float_comparison(path, agent.velocity_y, operator, expected_value)?,
            "gravity_scale" => check_float_comparison(path, agent.gravity_scale, operator, expected_value)?,
            "state" => {
                let expected = expected_value.trim_matches('"');
                let actual = agent.state.to_string();
                let pass = match operator {
                    "!=" => actual != expected,
                    _ => actual == expected,
                };
                if !pass {
                    return Err(AssertionError {
                        message: format!("State check failed: {}", check),
                        expected: format!("{} {}", operator, expected),
                        actual,
                    });
                }
            }
            "facing_right" => check_bool(check, agent.facing_right, expected_value)?,
            "grounded" => check_bool(check, agent.grounded, expected_value)?,
            "climbing" => check_bool(check, agent.climbing, expected_value)?,
            "enabled" => check_bool(check, agent.enabled, expected_value)?,
            "paused" => check_bool(check, agent.paused, expected_value)?,
            other => {
                return Err(AssertionError {
                    message: format!("Unknown property '{}'", other),
                    expected: "x, y, velocity_x, velocity_y, gravity_scale, state, facing_right, grounded, climbing, enabled, paused".to_string(),
                    actual: other.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn check_bool(check: &str, actual: bool, expected_value: &str) -> Result<(), AssertionError> {
    let expected = expected_value == "true";
    if actual != expected {
        return Err(AssertionError {
            message: format!("Check failed: {}", check),
            expected: expected_value.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Check float comparison with operator
fn check_float_comparison(path: &str, actual: f32, operator: &str, expected_str: &str) -> Result<(), AssertionError> {
    let value: f32 = expected_str.trim().parse().map_err(|_| AssertionError {
        message: format!("Invalid value for {}", path),
        expected: "number".to_string(),
        actual: expected_str.to_string(),
    })?;

    let pass = match operator {
        ">=" => actual >= value,
        "<=" => actual <= value,
        ">" => actual > value,
        "<" => actual < value,
        "=" | "==" => (actual - value).abs() < 0.1,
        "!=" => (actual - value).abs() >= 0.1,
        _ => true, // Unknown operator, pass by default
    };

    if !pass {
        return Err(AssertionError {
            message: format!("Check failed: {} {} {} (actual: {:.2})", path, operator, expected_str, actual),
            expected: format!("{} {} {}", path, operator, value),
            actual: format!("{:.2}", actual),
        });
    }

    Ok(())
}
