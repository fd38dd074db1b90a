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

//! HTTP surface for the Elections service (spec §4.2, §4.3, §6).

use ekklesia_core::{
	audit::{AuditRecord, AuditSink},
	correlation_id,
	error::Error,
	identity::{Identity, IdentityVerifier},
	ratelimit::{Operation, RateLimiter},
};
use ekklesia_store::{
	elections::{self, BallotContent},
	model::{Election, ElectionDraft, ElectionStatus, VotingType},
};
use ekklesia_tabulation::{approval, committee, plurality, stv};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sqlx::PgPool;
use std::{collections::BTreeMap, net::IpAddr, sync::Arc};
use uuid::Uuid;
use warp::{http::StatusCode, Filter, Rejection, Reply};

pub struct AppState {
	pub pool: PgPool,
	pub identity_verifier: Arc<dyn IdentityVerifier>,
	pub audit: Arc<dyn AuditSink>,
	pub rate_limiter: Arc<RateLimiter>,
	pub s2s_shared_secret: String,
	pub anonymisation_secret_salt: String,
}

#[derive(Deserialize)]
struct S2sTokenRequest {
	election_id: Uuid,
	token_hash: String,
}

#[derive(Deserialize)]
struct BallotRequest {
	#[serde(default)]
	answer_id: Option<String>,
	#[serde(default)]
	selected_answer_ids: Vec<String>,
	#[serde(default)]
	ranked_answers: Vec<String>,
	#[serde(default)]
	justifications: BTreeMap<String, String>,
	/// Legacy token-hash path (spec §4.3); absent on the member-authenticated
	/// path, where the bearer credential supplies identity instead.
	#[serde(default)]
	token: Option<String>,
}

#[derive(Serialize)]
struct BallotResponse {
	ballot_id: Uuid,
}

#[derive(Serialize)]
struct TransitionResponse {
	applied: bool,
	status: &'static str,
}

fn bearer(header: Option<String>) -> Result<String, Rejection> {
	let header = header.ok_or_else(|| warp::reject::custom(Error::Unauthenticated))?;
	header.strip_prefix("Bearer ").map(str::to_string).ok_or_else(|| warp::reject::custom(Error::Unauthenticated))
}

fn status_label(status: ElectionStatus) -> &'static str {
	match status {
		ElectionStatus::Draft => "draft",
		ElectionStatus::Published => "published",
		ElectionStatus::Paused => "paused",
		ElectionStatus::Closed => "closed",
		ElectionStatus::Archived => "archived",
	}
}

async fn handle_register_token(state: Arc<AppState>, body: S2sTokenRequest) -> Result<Box<dyn Reply>, Rejection> {
	elections::register_token(&state.pool, body.election_id, &body.token_hash).await.map_err(warp::reject::custom)?;
	Ok(Box::new(warp::reply::json(&serde_json::json!({ "registered": true }))))
}

async fn handle_list_elections(
	state: Arc<AppState>,
	credential: Option<String>,
) -> Result<Box<dyn Reply>, Rejection> {
	let include_all = caller_is_management(&state, credential).await;
	let elections = elections::list(&state.pool, include_all).await.map_err(warp::reject::custom)?;
	Ok(Box::new(warp::reply::json(&elections)))
}

/// Best-effort management check for routes that degrade to public
/// visibility rather than reject outright on a missing or invalid bearer
/// credential (spec §4.2 eligibility-check step 1).
async fn caller_is_management(state: &AppState, credential: Option<String>) -> bool {
	match credential {
		Some(raw) => match bearer(Some(raw)) {
			Ok(cred) => state.identity_verifier.verify(&cred).await.map(|i| i.roles.is_management()).unwrap_or(false),
			Err(_) => false,
		},
		None => false,
	}
}

async fn handle_get_election(
	state: Arc<AppState>,
	election_id: Uuid,
	credential: Option<String>,
) -> Result<Box<dyn Reply>, Rejection> {
	let election = elections::get(&state.pool, election_id)
		.await
		.map_err(warp::reject::custom)?
		.ok_or_else(|| warp::reject::custom(Error::NotFound("election".into())))?;
	if election.hidden && !caller_is_management(&state, credential).await {
		return Err(warp::reject::custom(Error::NotFound("election".into())));
	}
	Ok(Box::new(warp::reply::json(&election)))
}

async fn handle_create_election(
	state: Arc<AppState>,
	credential: Option<String>,
	mut draft: ElectionDraft,
) -> Result<Box<dyn Reply>, Rejection> {
	let (identity, corr) = authenticate_management(&state, credential, None).await?;
	ekklesia_store::model::validate_and_normalize(&mut draft).map_err(warp::reject::custom)?;
	let election = elections::create(&state.pool, &draft, &identity.subject_id).await.map_err(warp::reject::custom)?;
	state.audit.record(AuditRecord::success("create_election", identity.subject_id, corr)).await;
	Ok(Box::new(warp::reply::json(&election)))
}

async fn handle_update_draft(
	state: Arc<AppState>,
	election_id: Uuid,
	credential: Option<String>,
	mut draft: ElectionDraft,
) -> Result<Box<dyn Reply>, Rejection> {
	let (identity, corr) = authenticate_management(&state, credential, None).await?;
	ekklesia_store::model::validate_and_normalize(&mut draft).map_err(warp::reject::custom)?;
	let election =
		elections::update_draft(&state.pool, election_id, &draft, &identity.subject_id).await.map_err(warp::reject::custom)?;
	state.audit.record(AuditRecord::success("update_election_draft", identity.subject_id, corr)).await;
	Ok(Box::new(warp::reply::json(&election)))
}

#[derive(Deserialize)]
struct HiddenRequest {
	hidden: bool,
}

async fn handle_set_hidden(
	state: Arc<AppState>,
	election_id: Uuid,
	credential: Option<String>,
	body: HiddenRequest,
) -> Result<Box<dyn Reply>, Rejection> {
	let (identity, corr) = authenticate_management(&state, credential, None).await?;
	elections::set_hidden(&state.pool, election_id, body.hidden, &identity.subject_id).await.map_err(warp::reject::custom)?;
	state.audit.record(AuditRecord::success("set_election_hidden", identity.subject_id, corr)).await;
	Ok(Box::new(warp::reply::json(&serde_json::json!({ "hidden": body.hidden }))))
}

async fn handle_transition(
	state: Arc<AppState>,
	election_id: Uuid,
	action: String,
	credential: Option<String>,
) -> Result<Box<dyn Reply>, Rejection> {
	let (identity, corr) = authenticate_management(&state, credential, None).await?;
	let (from, to): (&[ElectionStatus], ElectionStatus) = match action.as_str() {
		"publish" => (&[ElectionStatus::Draft], ElectionStatus::Published),
		"pause" => (&[ElectionStatus::Published], ElectionStatus::Paused),
		"resume" => (&[ElectionStatus::Paused], ElectionStatus::Published),
		"close" => (&[ElectionStatus::Published, ElectionStatus::Paused], ElectionStatus::Closed),
		"archive" => (&[ElectionStatus::Closed], ElectionStatus::Archived),
		_ => return Err(warp::reject::custom(Error::validation("action", "unknown lifecycle transition"))),
	};
	let applied = elections::transition(&state.pool, election_id, from, to, &identity.subject_id)
		.await
		.map_err(warp::reject::custom)?;
	state
		.audit
		.record(AuditRecord::success(format!("election_{action}"), identity.subject_id, corr).with_details(
			serde_json::json!({ "election_id": election_id, "applied": applied }),
		))
		.await;
	Ok(Box::new(warp::reply::json(&TransitionResponse { applied, status: status_label(to) })))
}

async fn handle_anonymize(
	state: Arc<AppState>,
	election_id: Uuid,
	credential: Option<String>,
) -> Result<Box<dyn Reply>, Rejection> {
	let (identity, corr) = authenticate_management(&state, credential, None).await?;
	let election = elections::get(&state.pool, election_id)
		.await
		.map_err(warp::reject::custom)?
		.ok_or_else(|| warp::reject::custom(Error::NotFound("election".into())))?;
	if !matches!(election.status, ElectionStatus::Closed | ElectionStatus::Archived) {
		return Err(warp::reject::custom(Error::Conflict("anonymisation requires a closed or archived election".into())));
	}
	if election.preserve_voter_identity {
		return Err(warp::reject::custom(Error::Conflict(
			"election preserves voter identity and is not eligible for anonymisation".into(),
		)));
	}
	let updated = elections::anonymize_ballots(&state.pool, election_id, &state.anonymisation_secret_salt)
		.await
		.map_err(warp::reject::custom)?;
	state
		.audit
		.record(AuditRecord::success("anonymize_ballots", identity.subject_id, corr).with_details(
			serde_json::json!({ "election_id": election_id, "rows_updated": updated }),
		))
		.await;
	Ok(Box::new(warp::reply::json(&serde_json::json!({ "rows_updated": updated }))))
}

async fn authenticate_management(
	state: &AppState,
	credential: Option<String>,
	corr_header: Option<String>,
) -> Result<(Identity, String), Rejection> {
	let corr = correlation_id(corr_header.as_deref());
	let credential = bearer(credential)?;
	let identity = state.identity_verifier.verify(&credential).await.map_err(warp::reject::custom)?;
	if !identity.roles.is_management() {
		state
			.audit
			.record(AuditRecord::failure("management_action", identity.subject_id.clone(), corr.clone(), "forbidden"))
			.await;
		return Err(warp::reject::custom(Error::Forbidden("management role required".into())));
	}
	Ok((identity, corr))
}

fn eligible(identity: &Identity, election: &Election) -> bool {
	use ekklesia_store::model::Eligibility;
	match election.eligibility {
		Eligibility::All => true,
		Eligibility::Members => identity.is_member,
		Eligibility::Admins => identity.roles.is_management(),
		Eligibility::Committee => election.committee_member_uids.contains(&identity.member_uid),
	}
}

/// `POST /api/elections/{id}/ballot`: dispatches on whether the request
/// carries a legacy `token` (spec §4.3 "legacy token-hash path") or a bearer
/// credential (the member-authenticated path).
async fn handle_submit_ballot(
	state: Arc<AppState>,
	ip: IpAddr,
	election_id: Uuid,
	credential: Option<String>,
	body: BallotRequest,
) -> Result<Box<dyn Reply>, Rejection> {
	state.rate_limiter.check(ip, Operation::BallotSubmission).map_err(warp::reject::custom)?;

	let election = elections::get(&state.pool, election_id)
		.await
		.map_err(warp::reject::custom)?
		.ok_or_else(|| warp::reject::custom(Error::NotFound("election".into())))?;
	if election.hidden && !caller_is_management(&state, credential.clone()).await {
		return Err(warp::reject::custom(Error::NotFound("election".into())));
	}
	if election.status != ElectionStatus::Published {
		return Err(warp::reject::custom(Error::Conflict("election is not open for voting".into())));
	}

	validate_ballot_shape(&election, &body).map_err(warp::reject::custom)?;

	if let Some(token) = &body.token {
		let token_hash = ekklesia_core::token::hash_token(token);
		let answer_id = body.answer_id.clone().ok_or_else(|| {
			warp::reject::custom(Error::validation("answer_id", "required on the token-hash ballot path"))
		})?;
		let ballot_id =
			elections::insert_token_ballot(&state.pool, &token_hash, &answer_id).await.map_err(warp::reject::custom)?;
		state.audit.record(AuditRecord::success("submit_ballot", "token".to_string(), correlation_id(None))).await;
		return Ok(Box::new(warp::reply::json(&BallotResponse { ballot_id })));
	}

	let credential = bearer(credential)?;
	let identity = state.identity_verifier.verify(&credential).await.map_err(warp::reject::custom)?;
	if !eligible(&identity, &election) {
		return Err(warp::reject::custom(Error::Forbidden("not eligible for this election".into())));
	}
	if elections::has_voted(&state.pool, election_id, &identity.member_uid).await.map_err(warp::reject::custom)? {
		return Err(warp::reject::custom(Error::AlreadyVoted));
	}

	let justifications: Json = serde_json::to_value(&body.justifications).unwrap_or(Json::Null);
	let content = BallotContent {
		answer_id: body.answer_id.clone(),
		selected_answer_ids: body.selected_answer_ids.clone(),
		ranked_answers: body.ranked_answers.clone(),
		justifications,
	};
	let ballot_id = elections::insert_member_ballot(&state.pool, election_id, &identity.member_uid, &content)
		.await
		.map_err(warp::reject::custom)?;
	state
		.audit
		.record(AuditRecord::success("submit_ballot", identity.subject_id, correlation_id(None)).with_details(
			serde_json::json!({ "election_id": election_id }),
		))
		.await;
	Ok(Box::new(warp::reply::json(&BallotResponse { ballot_id })))
}

/// Shape checks that belong to the request, not the persisted model (spec
/// §4.3 steps 4-6): exactly one content field populated per voting type, and
/// justification presence when the election requires it.
fn validate_ballot_shape(election: &Election, body: &BallotRequest) -> Result<(), Error> {
	match election.voting_type {
		VotingType::SingleChoice => {
			if body.answer_id.is_none() {
				return Err(Error::validation("answer_id", "required for single-choice ballots"));
			}
		},
		VotingType::MultiChoice => {
			if body.selected_answer_ids.is_empty() {
				return Err(Error::validation("selected_answer_ids", "required for multi-choice ballots"));
			}
			if body.selected_answer_ids.len() as i32 > election.max_selections {
				return Err(Error::validation("selected_answer_ids", "exceeds max_selections"));
			}
		},
		VotingType::RankedChoice | VotingType::NominationCommittee => {
			if body.ranked_answers.is_empty() {
				return Err(Error::validation("ranked_answers", "required for ranked ballots"));
			}
			let mut seen = std::collections::BTreeSet::new();
			if !body.ranked_answers.iter().all(|a| seen.insert(a)) {
				return Err(Error::validation("ranked_answers", "must not repeat an answer id"));
			}
			if election.requires_justification {
				let top_n = election.justification_required_for_top_n.max(0) as usize;
				for candidate in body.ranked_answers.iter().take(top_n) {
					if !body.justifications.contains_key(candidate) {
						return Err(Error::validation("justifications", "missing for a required top-ranked candidate"));
					}
				}
			}
		},
	}
	Ok(())
}

/// `GET /api/elections/{id}/results` (spec §4.3: management may always view;
/// everyone else only once closed/archived and not embargoed).
async fn handle_results(
	state: Arc<AppState>,
	election_id: Uuid,
	credential: Option<String>,
) -> Result<Box<dyn Reply>, Rejection> {
	let election = elections::get(&state.pool, election_id)
		.await
		.map_err(warp::reject::custom)?
		.ok_or_else(|| warp::reject::custom(Error::NotFound("election".into())))?;

	let is_management = caller_is_management(&state, credential).await;
	if election.hidden && !is_management {
		return Err(warp::reject::custom(Error::NotFound("election".into())));
	}
	let publicly_visible = matches!(election.status, ElectionStatus::Closed | ElectionStatus::Archived);
	if !is_management && !publicly_visible {
		return Err(warp::reject::custom(Error::Forbidden("results are not yet available".into())));
	}

	let answer_ids: Vec<String> = election.answers.iter().map(|a| a.id.clone()).collect();
	let body = match election.voting_type {
		VotingType::SingleChoice => {
			let rows = elections::ballots_for_tally(&state.pool, election_id).await.map_err(warp::reject::custom)?;
			let ballots: Vec<String> = rows.into_iter().filter_map(|r| r.answer_id).collect();
			serde_json::to_value(plurality::tabulate(&ballots, &answer_ids)).unwrap()
		},
		VotingType::MultiChoice => {
			let selections =
				elections::selected_answers_for_tally(&state.pool, election_id).await.map_err(warp::reject::custom)?;
			serde_json::to_value(approval::tabulate(&selections, &answer_ids, election.max_selections as usize)).unwrap()
		},
		VotingType::RankedChoice => {
			let rows = elections::ballots_for_tally(&state.pool, election_id).await.map_err(warp::reject::custom)?;
			let ballots: Vec<Vec<String>> = rows.into_iter().filter_map(|r| r.ranked_answers).collect();
			let quota = match election.quota_type {
				Some(ekklesia_store::model::QuotaType::Hare) => stv::Quota::Hare,
				_ => stv::Quota::Droop,
			};
			let result = stv::tabulate(&ballots, &answer_ids, election.seats_to_fill as u32, quota).map_err(warp::reject::custom)?;
			serde_json::to_value(result).unwrap()
		},
		VotingType::NominationCommittee => {
			let rows = elections::ballots_for_tally(&state.pool, election_id).await.map_err(warp::reject::custom)?;
			let ballots: Vec<committee::CommitteeBallot> = rows
				.into_iter()
				.filter_map(|r| {
					let ranking = r.ranked_answers?;
					let member_uid = r.member_uid.unwrap_or_default();
					let justifications: BTreeMap<String, String> = serde_json::from_value(r.justifications).unwrap_or_default();
					Some(committee::CommitteeBallot { voter_member_uid: member_uid, ranking, justifications })
				})
				.collect();
			let result =
				committee::tabulate(&ballots, &answer_ids, election.seats_to_fill as u32).map_err(warp::reject::custom)?;
			serde_json::to_value(result).unwrap()
		},
	};
	Ok(Box::new(warp::reply::json(&body)))
}

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
	let shared_secret = state.s2s_shared_secret.clone();
	let with_state = warp::any().map(move || state.clone());
	let with_ip = warp::addr::remote()
		.map(|addr: Option<std::net::SocketAddr>| addr.map(|a| a.ip()).unwrap_or_else(|| "0.0.0.0".parse().unwrap()));

	let s2s_token = with_state
		.clone()
		.and(ekklesia_core::s2s::require_shared_secret(shared_secret))
		.and(warp::path!("s2s" / "v1" / "token"))
		.and(warp::post())
		.and(warp::body::json())
		.and_then(handle_register_token);

	let list_elections = with_state
		.clone()
		.and(warp::path!("api" / "elections"))
		.and(warp::get())
		.and(warp::header::optional::<String>("authorization"))
		.and_then(handle_list_elections);

	let get_election = with_state
		.clone()
		.and(warp::path!("api" / "elections" / Uuid))
		.and(warp::get())
		.and(warp::header::optional::<String>("authorization"))
		.and_then(handle_get_election);

	let create_election = with_state
		.clone()
		.and(warp::path!("api" / "elections"))
		.and(warp::post())
		.and(warp::header::optional::<String>("authorization"))
		.and(warp::body::json())
		.and_then(handle_create_election);

	let update_draft = with_state
		.clone()
		.and(warp::path!("api" / "elections" / Uuid))
		.and(warp::put())
		.and(warp::header::optional::<String>("authorization"))
		.and(warp::body::json())
		.and_then(handle_update_draft);

	let set_hidden = with_state
		.clone()
		.and(warp::path!("api" / "elections" / Uuid / "hidden"))
		.and(warp::post())
		.and(warp::header::optional::<String>("authorization"))
		.and(warp::body::json())
		.and_then(handle_set_hidden);

	let transition = with_state
		.clone()
		.and(warp::path!("api" / "elections" / Uuid / "transition" / String))
		.and(warp::post())
		.and(warp::header::optional::<String>("authorization"))
		.and_then(handle_transition);

	let anonymize = with_state
		.clone()
		.and(warp::path!("api" / "elections" / Uuid / "anonymize"))
		.and(warp::post())
		.and(warp::header::optional::<String>("authorization"))
		.and_then(handle_anonymize);

	let submit_ballot = with_state
		.clone()
		.and(with_ip)
		.and(warp::path!("api" / "elections" / Uuid / "ballot"))
		.and(warp::post())
		.and(warp::header::optional::<String>("authorization"))
		.and(warp::body::json())
		.and_then(handle_submit_ballot);

	let results = with_state
		.clone()
		.and(warp::path!("api" / "elections" / Uuid / "results"))
		.and(warp::get())
		.and(warp::header::optional::<String>("authorization"))
		.and_then(handle_results);

	s2s_token
		.or(list_elections)
		.unify()
		.or(get_election)
		.unify()
		.or(create_election)
		.unify()
		.or(update_draft)
		.unify()
		.or(set_hidden)
		.unify()
		.or(transition)
		.unify()
		.or(anonymize)
		.unify()
		.or(submit_ballot)
		.unify()
		.or(results)
		.unify()
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
