pub mod config;
pub mod interfaces;
pub mod lifecycle;
pub mod profile;

pub use config::AppConfig;
