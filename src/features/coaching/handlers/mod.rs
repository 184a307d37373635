pub mod coaching_handler;

pub use coaching_handler::*;
