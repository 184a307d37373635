pub mod coaching_service;

pub use coaching_service::CoachingService;
