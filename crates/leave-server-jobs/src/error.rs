// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use leave_server_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
	/// The job ran and failed. `retryable` failures are retried with backoff.
	#[error("job failed: {message}")]
	Failed { message: String, retryable: bool },

	#[error("job cancelled")]
	Cancelled,

	#[error("repository error: {0}")]
	Repository(#[from] DbError),

	#[error("job not found: {0}")]
	NotFound(String),
}

impl JobError {
	pub fn failed(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: false,
		}
	}

	pub fn retryable(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: true,
		}
	}
}

pub type Result<T> = std::result::Result<T, JobError>;
