//! Headless simulation - many navigation agents over one level
//!
//! Runs without a Bevy app or rendering, for scenario tests and batch runs.

pub mod parallel;

pub use parallel::{SimAgent, Simulation, init_parallel};
