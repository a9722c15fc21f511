pub mod dashboard;
pub mod display;
pub mod metrics;
pub mod probe;
pub mod render;
pub mod shell;
pub mod state;

pub use dashboard::{CycleOutcome, Dashboard};
pub use display::Display;
pub use metrics::{MetricsCollector, Snapshot};
pub use state::{FileStateStore, StateStore};
