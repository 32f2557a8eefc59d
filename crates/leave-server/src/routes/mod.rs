// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP route handlers.

pub mod admin;
pub mod auth;
pub mod backups;
pub mod health;
pub mod leave;
pub mod logs;
