/// Figure caching: manifest lookup, sibling cache, owner locks, script runner
/// and the execution gate that ties them together.
pub mod cache;
pub mod gate;
pub mod lock;
pub mod manifest;
pub mod runner;

pub use cache::{CacheEntryInfo, PutMode, SiblingCache};
pub use gate::{ExecutionGate, FigureRequest, GateOutcome, GateSettings};
pub use lock::OwnerLock;
pub use manifest::{ManifestEntry, ManifestLookup, ManifestStore};
pub use runner::{expand_template, Runner, RunnerSettings, ShellRunner};
