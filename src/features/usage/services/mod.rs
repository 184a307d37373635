pub mod usage_store;

pub use usage_store::UsageStore;
