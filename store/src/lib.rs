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

//! Postgres persistence for the Events and Elections schemas (spec §3).
//! Each service connects with its schema as the pool's `search_path` so the
//! same migration runner and query modules serve both without a schema
//! parameter threaded through every call.

pub mod elections;
pub mod events;
pub mod model;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::ConnectOptions;
use std::str::FromStr;
use std::time::Duration;

/// Opens a pool pinned to `schema` via `search_path`, so unqualified table
/// names in `events.rs`/`elections.rs` resolve without further ceremony.
pub async fn connect(database_url: &str, schema: &str, max_connections: u32) -> Result<sqlx::PgPool, sqlx::Error> {
	let options = PgConnectOptions::from_str(database_url)?
		.options([("search_path", schema)])
		.log_statements(log::LevelFilter::Debug);
	PgPoolOptions::new()
		.max_connections(max_connections)
		.acquire_timeout(Duration::from_secs(10))
		.connect_with(options)
		.await
}

/// Runs the pending migrations for a given service binary. `migrator` is
/// generated per-binary by `sqlx::migrate!()`, which resolves its path
/// relative to the invoking crate at compile time.
pub async fn migrate(pool: &sqlx::PgPool, migrator: &sqlx::migrate::Migrator) -> Result<(), sqlx::migrate::MigrateError> {
	migrator.run(pool).await
}
