pub mod coaching_dto;

pub use coaching_dto::*;
