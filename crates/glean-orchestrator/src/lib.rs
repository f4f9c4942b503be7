pub mod error;
pub mod pipeline;
pub mod report;

pub use error::OrchestratorError;
pub use pipeline::Orchestrator;
pub use report::{OrchestrationReport, Trigger};
