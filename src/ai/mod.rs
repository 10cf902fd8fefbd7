//! AI module - enemy navigation for side-scrolling levels
//!
//! Waypoint graph and A* search, direct-vs-alternate route arbitration,
//! environment sensors, jump and climb controllers, and the per-agent
//! navigation state machine that ties them together.

mod agent;
mod climb;
mod jump;
mod navigation;
mod pathfinding;
mod providers;
mod route;
mod schedule;
mod sensors;

pub use agent::*;
pub use climb::*;
pub use jump::*;
pub use navigation::*;
pub use pathfinding::*;
pub use providers::*;
pub use route::*;
pub use schedule::*;
pub use sensors::*;
