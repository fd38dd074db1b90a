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

//! `GET /health` — unauthenticated liveness probe (spec §6). Returns 200
//! only if the database pool can round-trip `SELECT 1`.

use sqlx::PgPool;
use std::convert::Infallible;
use warp::{http::StatusCode, Filter, Reply};

pub fn route(
	pool: PgPool,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
	warp::path("health").and(warp::get()).and_then(move || {
		let pool = pool.clone();
		async move {
			match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await {
				Ok(_) => Ok::<_, Infallible>(warp::reply::with_status("ok", StatusCode::OK)),
				Err(error) => {
					tracing::warn!(%error, "health check failed");
					Ok(warp::reply::with_status("database unavailable", StatusCode::SERVICE_UNAVAILABLE))
				},
			}
		}
	})
}
