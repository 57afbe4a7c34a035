// Library interface for figcache
// The binary and the integration tests share these modules.

pub mod cli;
pub mod cli_utils;
pub mod commands;
pub mod config;
pub mod config_discovery;
pub mod error;
pub mod figure;
pub mod logging;
pub mod merger;

// Re-export commonly used types
pub use error::{FigureError, FigureResult, ScriptFailure};
pub use figure::{
    ExecutionGate, FigureRequest, GateOutcome, GateSettings, ManifestLookup, ManifestStore,
    PutMode, Runner, RunnerSettings, ShellRunner, SiblingCache,
};
