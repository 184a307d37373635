pub mod usage_pruner;

pub use usage_pruner::UsagePruner;
