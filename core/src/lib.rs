// Copyright 2026 Ekklesia Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Shared plumbing for the Events and Elections services: the error
//! taxonomy, role hierarchy, masking helpers, identity verifier client,
//! audit logging, rate limiting, S2S auth, token hashing, settings
//! layering, structured concurrency, and the health-check route.

pub mod audit;
pub mod error;
pub mod health;
pub mod identity;
pub mod mask;
pub mod ratelimit;
pub mod role;
pub mod s2s;
pub mod settings;
pub mod task_scope;
pub mod token;

pub use error::{Error, Result};

/// Initialises `tracing` with an env filter from `RUST_LOG`, falling back to
/// `info`. Called once at the top of each binary's `main`.
pub fn init_tracing(default_filter: &str) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
	tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
}

/// A correlation id for a single request, threaded from the inbound
/// `x-request-id` header (or generated) through to the audit record.
pub fn correlation_id(provided: Option<&str>) -> String {
	provided
		.filter(|s| !s.is_empty())
		.map(str::to_string)
		.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
