//! Pipe orchestration for the Synapse sidebar.
//!
//! A pipe reads context from one chat surface, optionally runs it through an
//! external reasoning model, and injects the result into another surface
//! through the command bridge.

pub mod catalog;
pub mod errors;
pub mod executor;
pub mod model;
pub mod ports;

pub use catalog::{builtin_pipes, PipeCatalog};
pub use errors::{PipeError, TransformError};
pub use executor::{PipeExecutor, TriggerOutcome};
pub use model::{
    LogEntry, PipeConsole, PipeDef, PipeRun, PipeStatus, StageTimings, CURRENT_SOURCE,
};
pub use ports::{
    generate_metadata, run_deep_transform, ClipMetadata, OfflineTransform, TransformPort,
    DEFAULT_THINKING_BUDGET, METADATA_INPUT_CHARS,
};
