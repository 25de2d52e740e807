//! Application layer - the orchestration loop and its collaborators.
//!
//! - `orchestrator` - drives a run from case content to a triage report
//! - `request_executor` - one logical generate call with retry and backoff
//! - `outcome` - run results, failures, and run-fatal errors
//! - `prompts` - fixed instructions sent to the reasoning service
//! - `verification` - post-run completeness summary

mod orchestrator;
mod outcome;
pub mod prompts;
mod request_executor;
mod verification;

pub use orchestrator::{TurnOrchestrator, DEFAULT_MAX_TURNS};
pub use outcome::{OrchestrationError, RunFailure, TriageRun};
pub use request_executor::{ExecutorError, RequestExecutor, RetryPolicy};
pub use verification::{verify_run, RunVerification, VerificationCheck, VerificationGrade};
