// src/config/mod.rs
pub mod app;
pub mod taxonomy;

pub use app::AppConfig;
