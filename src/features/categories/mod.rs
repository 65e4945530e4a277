//! Category management: spending buckets with a monthly cap per user.

pub mod dtos;
pub mod models;
pub mod services;

pub use services::CategoryService;
