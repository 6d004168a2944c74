pub mod cli;
pub mod config;
pub mod control;
pub mod generator;
pub mod i18n;
pub mod llm;
pub mod references;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use generator::workflow::launch;
