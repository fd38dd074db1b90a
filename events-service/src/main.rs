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

//! Events service entry point: loads settings, connects and migrates the
//! Events schema, then runs the HTTP listener and the orphan-token sweep
//! inside one [`task_scope`] so a failure in either tears down the other
//! (spec §5).

mod elections_client;
mod routes;
mod settings;

use clap::Parser;
use ekklesia_core::{
	audit::PgAuditSink, identity::HttpIdentityVerifier, ratelimit::RateLimiter, settings::EkklesiaSettings, task_scope,
};
use elections_client::HttpElectionsClient;
use futures::FutureExt;
use settings::{CliOptions, EventsSettings};
use std::{sync::Arc, time::Duration};
use warp::Filter;

const SCHEMA: &str = "events";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	ekklesia_core::init_tracing("info");

	let opts = CliOptions::parse();
	let config_root = opts.config_root.clone();
	let settings = EventsSettings::load(&config_root, opts)?;

	let pool = ekklesia_store::connect(&settings.database.connection_string(), SCHEMA, settings.database.max_connections)
		.await?;
	static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
	ekklesia_store::migrate(&pool, &MIGRATOR).await?;

	let identity_verifier = Arc::new(HttpIdentityVerifier::new(
		settings.identity_verifier_base_url.clone(),
		Duration::from_secs(settings.identity_verifier_timeout_secs),
	));
	let elections_client = Arc::new(HttpElectionsClient::new(
		settings.elections_base_url.clone(),
		settings.s2s_shared_secret.clone(),
		Duration::from_secs(5),
	));
	let audit = Arc::new(PgAuditSink::new(pool.clone(), SCHEMA));
	let rate_limiter = Arc::new(RateLimiter::with_defaults());

	let state = Arc::new(routes::AppState {
		pool: pool.clone(),
		identity_verifier,
		elections_client,
		audit,
		rate_limiter,
		token_ttl: chrono::Duration::minutes(settings.token_ttl_minutes),
		deployment_mode: settings.deployment_mode,
		allow_reset_all_in_production: settings.allow_reset_all_in_production,
	});

	let bind_addr: std::net::SocketAddr = settings.bind_addr.parse()?;
	let sweep_max_age = chrono::Duration::minutes(settings.orphan_sweep_max_age_minutes);

	task_scope::task_scope(move |scope| {
		scope.spawn(run_orphan_sweep(pool.clone(), sweep_max_age));

		async move {
			let health = ekklesia_core::health::route(pool.clone());
			let api = routes::routes(state.clone()).recover(routes::handle_rejection);
			let app = health.or(api);

			warp::serve(app).run(bind_addr).await;
			Ok::<(), anyhow::Error>(())
		}
		.boxed()
	})
	.await?;

	Ok(())
}

/// Deletes Events-side token rows that were never marked used past
/// `max_age`, the Events half of the cross-service orphan reconciliation
/// described in spec §5.
async fn run_orphan_sweep(pool: sqlx::PgPool, max_age: chrono::Duration) -> anyhow::Result<()> {
	let mut interval = tokio::time::interval(Duration::from_secs(60));
	loop {
		interval.tick().await;
		match ekklesia_store::events::expired_unused_older_than(&pool, max_age).await {
			Ok(rows) => {
				for row in rows {
					if let Err(error) = ekklesia_store::events::reset_mine(&pool, &row.member_uid, row.election_id).await {
						tracing::warn!(%error, token_id = %row.token_id, "failed to sweep orphaned token");
					}
				}
			},
			Err(error) => tracing::warn!(%error, "orphan sweep query failed"),
		}
	}
}
