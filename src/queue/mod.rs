pub mod job;
pub mod orchestrator;
pub mod state;
pub mod summary;
pub mod worker;

pub use job::JobStatus;
pub use orchestrator::{BatchHandle, BatchObserver, Orchestrator};
pub use state::JobStore;
pub use summary::BatchSummary;
