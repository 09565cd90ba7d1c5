//! Orchestration core: runner access, correlation, sequencing and lifecycle.
//!
//! Internal modules:
//! - [`gateway`]: exclusive, lifecycle-aware access to the shared peer runner;
//! - [`classifier`]: message vocabulary and request/response pairs;
//! - [`correlator`]: send a message and await its correlated response;
//! - [`executor`]: run handshake sequences and single exchanges, publishing events;
//! - [`orchestrator`]: owns every component and handles shutdown;
//! - [`shutdown`]: OS termination signal handling.

mod builder;
mod classifier;
mod config;
mod correlator;
mod executor;
mod gateway;
mod orchestrator;
mod shutdown;

pub use builder::OrchestratorBuilder;
pub use classifier::{Classification, MessageClassifier};
pub use config::{Config, DEFAULT_EXPECT_TIMEOUT};
pub use correlator::ActionCorrelator;
pub use executor::SequenceExecutor;
pub use gateway::{RunnerFactory, RunnerGateway, RunnerHandle, RunnerState};
pub use orchestrator::Orchestrator;
pub use shutdown::shutdown_signal;
