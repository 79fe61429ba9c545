//! Synapse sidebar runtime
//!
//! Exposes the CLI, configuration, session wiring and the Gemini transform
//! for integration testing.

pub mod cli;
pub mod config;
pub mod llm;
pub mod session;

pub use config::AppConfig;
pub use session::Session;
