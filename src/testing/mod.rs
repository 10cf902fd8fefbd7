//! Scenario testing system for deterministic navigation testing
//!
//! Provides infrastructure for running scripted scenarios against the
//! headless simulation to verify navigation behavior.

pub mod assertions;
pub mod parser;
pub mod runner;

pub use assertions::{AssertionError, check_sequence, check_state};
pub use parser::{AgentDef, AggroDef, ExpectedEvent, FrameInput, StateAssertion, TestDefinition, TestExpectations, TestSetup};
pub use runner::{TestResult, run_test};

/// Default path for test scenarios
pub const SCENARIOS_DIR: &str = "tests/scenarios";
