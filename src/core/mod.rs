pub mod models;
pub mod orchestrator;
pub mod pool;
pub mod source;

pub use models::{JobFailure, ObjectKey, Operation, RunReport, WorkerReport};
pub use orchestrator::Orchestrator;
pub use pool::{Action, WorkerPool};
pub use source::{JobSource, LocalWalker, RemoteEnumerator, walk_keys};
