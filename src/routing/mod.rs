pub mod astar;
pub mod cost;
pub mod engine;

pub use astar::{find_path, DEFAULT_STEP_LIMIT};
pub use cost::CostModel;
pub use engine::RoutingEngine;
