pub mod enforcer;
pub mod robots;

pub use enforcer::PolitenessEnforcer;
pub use robots::ParsedRobots;
