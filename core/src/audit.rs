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

//! Append-only audit logging (spec §3, §4.4). Every state-changing or
//! privilege-gated operation emits one [`AuditRecord`]; `details` must only
//! ever carry values produced by [`crate::mask`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as Json;
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
	pub action: String,
	pub success: bool,
	/// Masked actor identifier, e.g. `mask::mask_kennitala(..)` or
	/// `"s2s:events-service"`. Never a raw kennitala, token, or salt.
	pub performed_by: String,
	pub correlation_id: String,
	pub reason_code: Option<String>,
	pub details: Json,
}

impl AuditRecord {
	pub fn success(action: impl Into<String>, performed_by: impl Into<String>, correlation_id: impl Into<String>) -> Self {
		Self {
			action: action.into(),
			success: true,
			performed_by: performed_by.into(),
			correlation_id: correlation_id.into(),
			reason_code: None,
			details: Json::Null,
		}
	}

	pub fn failure(
		action: impl Into<String>,
		performed_by: impl Into<String>,
		correlation_id: impl Into<String>,
		reason_code: impl Into<String>,
	) -> Self {
		Self {
			action: action.into(),
			success: false,
			performed_by: performed_by.into(),
			correlation_id: correlation_id.into(),
			reason_code: Some(reason_code.into()),
			details: Json::Null,
		}
	}

	pub fn with_details(mut self, details: Json) -> Self {
		self.details = details;
		self
	}
}

#[async_trait]
pub trait AuditSink: Send + Sync {
	async fn record(&self, record: AuditRecord);
}

/// Writes audit rows into `{schema}.audit_log` and mirrors the same record
/// to the structured log stream, so an operator tailing logs sees the same
/// picture as someone querying the append-only table.
pub struct PgAuditSink {
	pool: PgPool,
	schema: &'static str,
}

impl PgAuditSink {
	pub fn new(pool: PgPool, schema: &'static str) -> Self {
		Self { pool, schema }
	}
}

#[async_trait]
impl AuditSink for PgAuditSink {
	async fn record(&self, record: AuditRecord) {
		tracing::info!(
			action = %record.action,
			success = record.success,
			performed_by = %record.performed_by,
			correlation_id = %record.correlation_id,
			reason_code = ?record.reason_code,
			"audit"
		);

		let query = format!(
			"INSERT INTO {}.audit_log (action, success, performed_by, correlation_id, reason_code, details_json) \
			 VALUES ($1, $2, $3, $4, $5, $6)",
			self.schema
		);
		if let Err(error) = sqlx::query(&query)
			.bind(&record.action)
			.bind(record.success)
			.bind(&record.performed_by)
			.bind(&record.correlation_id)
			.bind(&record.reason_code)
			.bind(&record.details)
			.execute(&self.pool)
			.await
		{
			// The audit row is best-effort relative to the request's own
			// outcome: a failure to persist it must never roll back or mask
			// the operation it was describing.
			tracing::error!(%error, "failed to persist audit record");
		}
	}
}

/// No-op sink for unit tests that don't exercise a database.
#[derive(Default)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
	async fn record(&self, _record: AuditRecord) {}
}
