pub mod coaching;
pub mod rate_limits;
pub mod usage;
