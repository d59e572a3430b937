pub mod cli_engine;
pub mod config;

pub use cli_engine::{CliEngine, DEFAULT_ENGINE};
pub use config::{AppConfig, load_app_config};
