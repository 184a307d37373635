pub mod services;
pub mod workers;

pub use services::UsageStore;
pub use workers::UsagePruner;
