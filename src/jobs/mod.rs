//! Jobs module - Request types, execution, dispatch and polling

pub mod dispatcher;
pub mod executor;
pub mod poller;
pub mod types;

pub use dispatcher::JobDispatcher;
pub use poller::{JobPoller, PollOutcome};
pub use types::{GenerationRequest, GenerationResult, JobAccepted, JobHandle};
