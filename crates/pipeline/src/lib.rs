pub mod ingest_stage;
pub mod orchestrator;
pub mod recorder;

pub use ingest_stage::ingest_batch;
pub use orchestrator::{
    BatchReport, SubmissionError, SubmissionOrchestrator, SubmitStep,
};
