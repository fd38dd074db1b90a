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

//! Scheduled lifecycle transitions (spec §4.2, §4.4): at each tick, publish
//! every `draft` election whose `scheduled_start` is due and close every
//! `published`/`paused` election whose `scheduled_end` is due. Each
//! transition goes through [`ekklesia_store::elections::transition`], which
//! is itself idempotent, so a tick racing the admin API or a previous tick
//! can never double-apply a transition.

use ekklesia_core::audit::{AuditRecord, AuditSink};
use ekklesia_store::model::ElectionStatus;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};

pub async fn run(pool: PgPool, audit: Arc<dyn AuditSink>, tick: Duration) -> anyhow::Result<()> {
	let mut interval = tokio::time::interval(tick);
	loop {
		interval.tick().await;
		let now = chrono::Utc::now();

		match ekklesia_store::elections::due_for_scheduled_start(&pool, now).await {
			Ok(ids) => {
				for id in ids {
					apply(&pool, &audit, id, &[ElectionStatus::Draft], ElectionStatus::Published, "scheduled_publish").await;
				}
			},
			Err(error) => tracing::warn!(%error, "scheduler: due_for_scheduled_start query failed"),
		}

		match ekklesia_store::elections::due_for_scheduled_end(&pool, now).await {
			Ok(ids) => {
				for id in ids {
					apply(
						&pool,
						&audit,
						id,
						&[ElectionStatus::Published, ElectionStatus::Paused],
						ElectionStatus::Closed,
						"scheduled_close",
					)
					.await;
				}
			},
			Err(error) => tracing::warn!(%error, "scheduler: due_for_scheduled_end query failed"),
		}
	}
}

async fn apply(
	pool: &PgPool,
	audit: &Arc<dyn AuditSink>,
	election_id: uuid::Uuid,
	from: &[ElectionStatus],
	to: ElectionStatus,
	action: &str,
) {
	match ekklesia_store::elections::transition(pool, election_id, from, to, "scheduler").await {
		Ok(applied) => {
			audit
				.record(
					AuditRecord::success(action.to_string(), "scheduler".to_string(), uuid::Uuid::new_v4().to_string())
						.with_details(serde_json::json!({ "election_id": election_id, "applied": applied })),
				)
				.await;
		},
		Err(error) => tracing::warn!(%error, election_id = %election_id, action, "scheduler: transition failed"),
	}
}
