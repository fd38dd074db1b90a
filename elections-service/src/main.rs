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

//! Elections service entry point: loads settings, connects and migrates the
//! Elections schema, then runs the HTTP listener, the lifecycle scheduler,
//! and the orphan-token-registration sweep inside one [`task_scope`] (spec
//! §5).

mod routes;
mod scheduler;
mod settings;

use clap::Parser;
use ekklesia_core::{audit::PgAuditSink, identity::HttpIdentityVerifier, ratelimit::RateLimiter, settings::EkklesiaSettings, task_scope};
use futures::FutureExt;
use settings::{CliOptions, ElectionsSettings};
use std::{sync::Arc, time::Duration};
use warp::Filter;

const SCHEMA: &str = "elections";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	ekklesia_core::init_tracing("info");

	let opts = CliOptions::parse();
	let config_root = opts.config_root.clone();
	let settings = ElectionsSettings::load(&config_root, opts)?;

	let pool = ekklesia_store::connect(&settings.database.connection_string(), SCHEMA, settings.database.max_connections)
		.await?;
	static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
	ekklesia_store::migrate(&pool, &MIGRATOR).await?;

	// Needed here, independent of the Events service, to resolve bearer
	// credentials presented directly by a member's browser on the ballot and
	// results endpoints.
	let identity_verifier = Arc::new(HttpIdentityVerifier::new(
		settings.identity_verifier_base_url.clone(),
		Duration::from_secs(settings.identity_verifier_timeout_secs),
	));
	let audit: Arc<dyn ekklesia_core::audit::AuditSink> = Arc::new(PgAuditSink::new(pool.clone(), SCHEMA));
	let rate_limiter = Arc::new(RateLimiter::with_defaults());

	let state = Arc::new(routes::AppState {
		pool: pool.clone(),
		identity_verifier,
		audit: audit.clone(),
		rate_limiter,
		s2s_shared_secret: settings.s2s_shared_secret.clone(),
		anonymisation_secret_salt: settings.anonymisation_secret_salt.clone(),
	});

	let bind_addr: std::net::SocketAddr = settings.bind_addr.parse()?;
	let sweep_max_age = chrono::Duration::minutes(settings.orphan_sweep_max_age_minutes);
	let scheduler_tick = Duration::from_secs(settings.scheduler_interval_secs);

	task_scope::task_scope(move |scope| {
		scope.spawn(scheduler::run(pool.clone(), audit.clone(), scheduler_tick));
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

/// Deletes Elections-side token registrations that were never marked used
/// past `max_age` — the Elections half of the cross-service orphan
/// reconciliation described in spec §5.
async fn run_orphan_sweep(pool: sqlx::PgPool, max_age: chrono::Duration) -> anyhow::Result<()> {
	let mut interval = tokio::time::interval(Duration::from_secs(60));
	loop {
		interval.tick().await;
		match ekklesia_store::elections::orphaned_tokens_older_than(&pool, max_age).await {
			Ok(hashes) => {
				for hash in hashes {
					if let Err(error) = ekklesia_store::elections::delete_registered_token(&pool, &hash).await {
						tracing::warn!(%error, "failed to sweep orphaned token registration");
					}
				}
			},
			Err(error) => tracing::warn!(%error, "orphan sweep query failed"),
		}
	}
}
