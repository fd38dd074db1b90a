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

//! The error taxonomy shared by the Events and Elections services. Every
//! fault a handler can produce collapses into exactly one of these variants;
//! `into_response` is the single place that maps a variant onto an HTTP
//! status and a JSON body.

use serde::Serialize;
use warp::http::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("authentication required")]
	Unauthenticated,

	#[error("forbidden: {0}")]
	Forbidden(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("already voted")]
	AlreadyVoted,

	#[error("validation failed: {field}: {reason}")]
	ValidationError { field: String, reason: String },

	#[error("too many requests, retry after {retry_after_secs}s")]
	TooManyRequests { retry_after_secs: u64 },

	#[error("dependency failure: {0}")]
	DependencyFailure(String),

	#[error("tabulation halted: tie unresolved among {candidates:?}")]
	TieUnresolved { candidates: Vec<String> },

	#[error("internal error")]
	Internal(#[source] anyhow::Error),
}

impl Error {
	pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
		Error::ValidationError { field: field.into(), reason: reason.into() }
	}

	/// A short machine-readable tag used as the audit log's `reason_code` and
	/// the JSON body's `error` field. Never includes interpolated data that
	/// might carry a kennitala or token.
	pub fn code(&self) -> &'static str {
		match self {
			Error::Unauthenticated => "unauthenticated",
			Error::Forbidden(_) => "forbidden",
			Error::NotFound(_) => "not_found",
			Error::Conflict(_) => "conflict",
			Error::AlreadyVoted => "already_voted",
			Error::ValidationError { .. } => "validation_error",
			Error::TooManyRequests { .. } => "too_many_requests",
			Error::DependencyFailure(_) => "dependency_failure",
			Error::TieUnresolved { .. } => "tie_unresolved",
			Error::Internal(_) => "internal",
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			Error::Unauthenticated => StatusCode::UNAUTHORIZED,
			Error::Forbidden(_) => StatusCode::FORBIDDEN,
			Error::NotFound(_) => StatusCode::NOT_FOUND,
			Error::Conflict(_) | Error::AlreadyVoted => StatusCode::CONFLICT,
			Error::ValidationError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
			Error::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
			Error::DependencyFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
			// A tie is reported in the 200 result payload, not as an HTTP fault.
			Error::TieUnresolved { .. } => StatusCode::OK,
			Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Exit code for admin CLIs, per the spec's §6 table.
	pub fn exit_code(&self) -> i32 {
		match self {
			Error::ValidationError { .. } => 1,
			Error::Unauthenticated | Error::Forbidden(_) => 2,
			Error::DependencyFailure(_) => 3,
			Error::Internal(_) => 4,
			_ => 1,
		}
	}
}

#[derive(Serialize)]
struct ErrorBody<'a> {
	error: &'a str,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	retry_after_secs: Option<u64>,
}

impl warp::reject::Reject for Error {}

pub fn into_response(err: &Error) -> warp::reply::WithStatus<warp::reply::Json> {
	if matches!(err, Error::Internal(_)) {
		tracing::error!(error = %err, "internal error");
	} else {
		tracing::debug!(error = %err, code = err.code(), "request failed");
	}
	let retry_after_secs = match err {
		Error::TooManyRequests { retry_after_secs } => Some(*retry_after_secs),
		_ => None,
	};
	let body = ErrorBody { error: err.code(), message: err.to_string(), retry_after_secs };
	warp::reply::with_status(warp::reply::json(&body), err.status())
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		if let sqlx::Error::Database(db_err) = &err {
			// Postgres SQLSTATE 23505 = unique_violation, 23514 = check_violation.
			match db_err.code().as_deref() {
				Some("23505") => return Error::Conflict(db_err.constraint().unwrap_or("unique").to_string()),
				Some("23514") => {
					return Error::validation(
						db_err.constraint().unwrap_or("check").to_string(),
						"row violates a database check constraint",
					)
				},
				_ => {},
			}
		}
		Error::Internal(anyhow::Error::new(err))
	}
}

impl From<anyhow::Error> for Error {
	fn from(err: anyhow::Error) -> Self {
		Error::Internal(err)
	}
}

pub type Result<T> = std::result::Result<T, Error>;
