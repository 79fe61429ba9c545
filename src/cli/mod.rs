pub mod app;
pub mod clip;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod inject;
pub mod output;
pub mod pipes;
pub mod run;
pub mod runtime;
pub mod status;

pub use clip::{cmd_clip, ClipArgs};
pub use config::{cmd_config, ConfigArgs};
pub use inject::{cmd_inject, InjectArgs};
pub use pipes::cmd_pipes;
pub use run::{cmd_run, RunArgs};
pub use status::{cmd_status, StatusArgs};
