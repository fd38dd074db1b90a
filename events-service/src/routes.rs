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

//! HTTP surface for the Events service (spec §4.1, §6).

use crate::elections_client::ElectionsClient;
use ekklesia_core::{
	audit::{AuditRecord, AuditSink},
	correlation_id,
	error::Error,
	identity::IdentityVerifier,
	mask,
	ratelimit::{Operation, RateLimiter},
	settings::DeploymentMode,
	token,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::{net::IpAddr, sync::Arc};
use uuid::Uuid;
use warp::{http::StatusCode, Filter, Rejection, Reply};

pub struct AppState {
	pub pool: PgPool,
	pub identity_verifier: Arc<dyn IdentityVerifier>,
	pub elections_client: Arc<dyn ElectionsClient>,
	pub audit: Arc<dyn AuditSink>,
	pub rate_limiter: Arc<RateLimiter>,
	pub token_ttl: chrono::Duration,
	pub deployment_mode: DeploymentMode,
	pub allow_reset_all_in_production: bool,
}

#[derive(Deserialize)]
struct TokenRequest {
	election_id: Uuid,
}

#[derive(Serialize)]
struct TokenResponse {
	token: String,
	expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct StatusResponse {
	has_token: bool,
	used: bool,
	expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Deserialize)]
struct ResetRequest {
	scope: String,
	#[serde(default)]
	confirm: Option<String>,
}

#[derive(Serialize)]
struct ResetResponse {
	deleted: u64,
}

fn bearer(header: Option<String>) -> Result<String, Rejection> {
	let header = header.ok_or_else(|| warp::reject::custom(Error::Unauthenticated))?;
	header
		.strip_prefix("Bearer ")
		.map(str::to_string)
		.ok_or_else(|| warp::reject::custom(Error::Unauthenticated))
}

async fn handle_request_token(
	state: Arc<AppState>,
	ip: IpAddr,
	request_id: Option<String>,
	credential: Option<String>,
	body: TokenRequest,
) -> Result<Box<dyn Reply>, Rejection> {
	state.rate_limiter.check(ip, Operation::TokenIssuance).map_err(warp::reject::custom)?;
	let corr = correlation_id(request_id.as_deref());
	let credential = bearer(credential)?;
	let identity = state.identity_verifier.verify(&credential).await.map_err(warp::reject::custom)?;

	let election = ekklesia_store::elections::get(&state.pool, body.election_id)
		.await
		.map_err(warp::reject::custom)?
		.ok_or_else(|| warp::reject::custom(Error::NotFound("election".into())))?;

	if !eligible(&identity, &election) {
		audit_failure(&state, &corr, &identity.subject_id, "request_token", "forbidden").await;
		return Err(warp::reject::custom(Error::Forbidden("not eligible for this election".into())));
	}

	let kennitala = identity
		.kennitala_normalized
		.clone()
		.ok_or_else(|| warp::reject::custom(Error::validation("kennitala", "missing from verified identity")))?;

	let mut tx = state.pool.begin().await.map_err(|e| warp::reject::custom(Error::from(e)))?;
	let active = ekklesia_store::events::lock_active_token(&mut tx, &identity.member_uid, body.election_id)
		.await
		.map_err(warp::reject::custom)?;
	if active.is_some() {
		return Err(warp::reject::custom(Error::Conflict("an active token already exists".into())));
	}
	ekklesia_store::events::delete_stale(&mut tx, &identity.member_uid, body.election_id)
		.await
		.map_err(warp::reject::custom)?;

	let plaintext = token::generate_plaintext_token();
	let token_hash = token::hash_token(&plaintext);

	let row = ekklesia_store::events::insert_token(
		&mut tx,
		&identity.member_uid,
		&kennitala,
		body.election_id,
		&token_hash,
		state.token_ttl,
	)
	.await
	.map_err(warp::reject::custom)?;

	if let Err(error) = state.elections_client.register_token(body.election_id, &token_hash).await {
		audit_failure(&state, &corr, &identity.subject_id, "request_token", "dependency_failure").await;
		return Err(warp::reject::custom(error));
	}

	tx.commit().await.map_err(|e| warp::reject::custom(Error::from(e)))?;

	state
		.audit
		.record(
			AuditRecord::success("request_token", mask::mask_kennitala(&kennitala), corr)
				.with_details(serde_json::json!({ "election_id": body.election_id, "token_hash": mask::mask_hash(&token_hash) })),
		)
		.await;

	Ok(Box::new(warp::reply::json(&TokenResponse { token: plaintext, expires_at: row.expires_at })))
}

async fn handle_my_status(
	state: Arc<AppState>,
	credential: Option<String>,
	election_id: Uuid,
) -> Result<Box<dyn Reply>, Rejection> {
	let credential = bearer(credential)?;
	let identity = state.identity_verifier.verify(&credential).await.map_err(warp::reject::custom)?;
	let status = ekklesia_store::events::status(&state.pool, &identity.member_uid, election_id)
		.await
		.map_err(warp::reject::custom)?;
	Ok(Box::new(warp::reply::json(&StatusResponse {
		has_token: status.has_token,
		used: status.used,
		expires_at: status.expires_at,
	})))
}

async fn handle_admin_reset(
	state: Arc<AppState>,
	ip: IpAddr,
	request_id: Option<String>,
	credential: Option<String>,
	election_id: Uuid,
	body: ResetRequest,
) -> Result<Box<dyn Reply>, Rejection> {
	state.rate_limiter.check(ip, Operation::AdminReset).map_err(warp::reject::custom)?;
	let corr = correlation_id(request_id.as_deref());
	let credential = bearer(credential)?;
	let identity = state.identity_verifier.verify(&credential).await.map_err(warp::reject::custom)?;

	match body.scope.as_str() {
		"mine" => {
			let deleted = ekklesia_store::events::reset_mine(&state.pool, &identity.member_uid, election_id)
				.await
				.map_err(warp::reject::custom)?;
			state.elections_client.delete_token_for_member(election_id, &identity.member_uid).await.ok();
			state.audit.record(AuditRecord::success("reset_mine", identity.subject_id.clone(), corr)).await;
			Ok(Box::new(warp::reply::json(&ResetResponse { deleted })))
		},
		"all" => {
			if !identity.roles.is_management() {
				audit_failure(&state, &corr, &identity.subject_id, "reset_all", "forbidden").await;
				return Err(warp::reject::custom(Error::Forbidden("reset all requires a management role".into())));
			}
			let allowed = state.deployment_mode == DeploymentMode::Development || state.allow_reset_all_in_production;
			if !allowed {
				audit_failure(&state, &corr, &identity.subject_id, "reset_all", "forbidden").await;
				return Err(warp::reject::custom(Error::Forbidden(
					"reset all is disabled in this deployment".into(),
				)));
			}
			if body.confirm.as_deref() != Some("RESET ALL") {
				return Err(warp::reject::custom(Error::validation("confirm", "must equal \"RESET ALL\"")));
			}
			let deleted = ekklesia_store::events::reset_all(&state.pool).await.map_err(warp::reject::custom)?;
			state.audit.record(AuditRecord::success("reset_all", identity.subject_id.clone(), corr)).await;
			Ok(Box::new(warp::reply::json(&ResetResponse { deleted })))
		},
		_ => Err(warp::reject::custom(Error::validation("scope", "must be \"mine\" or \"all\""))),
	}
}

async fn audit_failure(state: &AppState, corr: &str, actor: &str, action: &str, reason: &str) {
	state.audit.record(AuditRecord::failure(action.to_string(), actor.to_string(), corr.to_string(), reason.to_string())).await;
}

fn eligible(identity: &ekklesia_core::identity::Identity, election: &ekklesia_store::model::Election) -> bool {
	use ekklesia_store::model::Eligibility;
	match election.eligibility {
		Eligibility::All => true,
		Eligibility::Members => identity.is_member,
		Eligibility::Admins => identity.roles.is_management(),
		Eligibility::Committee => election.committee_member_uids.contains(&identity.member_uid),
	}
}

pub fn routes(
	state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
	let with_state = warp::any().map(move || state.clone());
	let with_ip = warp::addr::remote().map(|addr: Option<std::net::SocketAddr>| {
		addr.map(|a| a.ip()).unwrap_or_else(|| "0.0.0.0".parse().unwrap())
	});

	let request_token = warp::path!("api" / "token" / "request")
		.and(warp::post())
		.and(with_state.clone())
		.and(with_ip.clone())
		.and(warp::header::optional::<String>("x-request-id"))
		.and(warp::header::optional::<String>("authorization"))
		.and(warp::body::json())
		.and_then(handle_request_token);

	let my_status = warp::path!("api" / "my-status")
		.and(warp::get())
		.and(with_state.clone())
		.and(warp::header::optional::<String>("authorization"))
		.and(warp::query::<std::collections::HashMap<String, String>>())
		.and_then(|state, credential, query: std::collections::HashMap<String, String>| async move {
			let election_id: Uuid = query
				.get("election_id")
				.and_then(|s| s.parse().ok())
				.ok_or_else(|| warp::reject::custom(Error::validation("election_id", "missing or invalid")))?;
			handle_my_status(state, credential, election_id).await
		});

	let admin_reset = warp::path!("api" / "admin" / "reset-election")
		.and(warp::post())
		.and(with_state)
		.and(with_ip)
		.and(warp::header::optional::<String>("x-request-id"))
		.and(warp::header::optional::<String>("authorization"))
		.and(warp::query::<std::collections::HashMap<String, String>>())
		.and(warp::body::json())
		.and_then(
			|state, ip, request_id, credential, query: std::collections::HashMap<String, String>, body: ResetRequest| async move {
				let election_id: Uuid = query
					.get("election_id")
					.and_then(|s| s.parse().ok())
					.ok_or_else(|| warp::reject::custom(Error::validation("election_id", "missing or invalid")))?;
				handle_admin_reset(state, ip, request_id, credential, election_id, body).await
			},
		);

	request_token.or(my_status).unify().or(admin_reset).unify()
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, std::convert::Infallible> {
	if let Some(error) = err.find::<Error>() {
		return Ok(ekklesia_core::error::into_response(error));
	}
	if err.is_not_found() {
		let body = serde_json::json!({ "error": "not_found", "message": "no such route" });
		return Ok(warp::reply::with_status(warp::reply::json(&body), StatusCode::NOT_FOUND));
	}
	let body = serde_json::json!({ "error": "bad_request", "message": format!("{err:?}") });
	Ok(warp::reply::with_status(warp::reply::json(&body), StatusCode::BAD_REQUEST))
}
