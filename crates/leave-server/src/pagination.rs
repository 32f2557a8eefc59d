// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Page-number pagination for list endpoints.

use leave_server_db::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PageParams {
	pub page: Option<u32>,
	pub limit: Option<u32>,
}

impl PageParams {
	/// 1-based; 0 and absent both mean the first page.
	pub fn page_or_default(&self) -> u32 {
		self.page.unwrap_or(1).max(1)
	}

	pub fn limit_clamped(&self) -> u32 {
		self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
	}
}
