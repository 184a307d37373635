mod rate_limit_status;
mod window;

pub use rate_limit_status::{RateLimitStatus, WindowUsage};
pub use window::{EnforcementMode, RecordUsageOn, Window};
