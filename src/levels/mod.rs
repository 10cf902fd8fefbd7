//! Levels module - level files with geometry and waypoints

mod database;

pub use database::*;
