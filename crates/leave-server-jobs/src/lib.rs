// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background job scheduler for the leave server.
//!
//! Jobs run either on a fixed interval or once a day at a local wall-clock
//! time. Every run is recorded in `job_runs`; retryable failures are retried
//! with exponential backoff before the run is marked failed.

pub mod context;
pub mod error;
pub mod health;
pub mod job;
pub mod scheduler;
pub mod types;

pub use context::{CancellationToken, JobContext};
pub use error::{JobError, Result};
pub use health::{HealthState, JobHealthStatus, JobsHealthStatus, LastRunInfo};
pub use job::Job;
pub use scheduler::JobScheduler;
pub use types::{CompletedRun, JobDefinition, JobOutput, JobRun, JobStatus, JobType, TriggerSource};
