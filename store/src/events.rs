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

//! Queries against the Events schema's `tokens` table (spec §3, §4.1).

use chrono::{DateTime, Utc};
use ekklesia_core::error::Error;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(FromRow)]
pub struct TokenRow {
	pub token_id: Uuid,
	pub member_uid: String,
	pub kennitala_normalized: String,
	pub election_id: Uuid,
	pub token_plain_hash: String,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
	pub used: bool,
}

pub struct TokenStatus {
	pub has_token: bool,
	pub used: bool,
	pub expires_at: Option<DateTime<Utc>>,
}

/// Locks the `(member_uid, election_id)` row (if any) for the duration of the
/// transaction, per spec §4.1 step 4. Returns the row only when it is still
/// live (unexpired and unused); an expired or used row is treated as absent
/// by the caller, who is expected to have deleted it first via
/// [`delete_stale`].
pub async fn lock_active_token(
	tx: &mut Transaction<'_, Postgres>,
	member_uid: &str,
	election_id: Uuid,
) -> Result<Option<TokenRow>, Error> {
	let row: Option<TokenRow> = sqlx::query_as(
		r#"
		SELECT token_id, member_uid, kennitala_normalized, election_id,
		       token_plain_hash, created_at, expires_at, used
		FROM tokens
		WHERE member_uid = $1 AND election_id = $2
		FOR UPDATE
		"#,
	)
	.bind(member_uid)
	.bind(election_id)
	.fetch_optional(&mut **tx)
	.await?;

	match row {
		Some(row) if row.used || row.expires_at <= Utc::now() => Ok(None),
		other => Ok(other),
	}
}

/// Deletes a token row for `(member_uid, election_id)` regardless of state;
/// used both to clear stale rows before minting and to implement `reset
/// mine`. Returns the number of rows removed (0 or 1).
pub async fn delete_stale(
	tx: &mut Transaction<'_, Postgres>,
	member_uid: &str,
	election_id: Uuid,
) -> Result<u64, Error> {
	let result = sqlx::query("DELETE FROM tokens WHERE member_uid = $1 AND election_id = $2")
		.bind(member_uid)
		.bind(election_id)
		.execute(&mut **tx)
		.await?;
	Ok(result.rows_affected())
}

pub async fn insert_token(
	tx: &mut Transaction<'_, Postgres>,
	member_uid: &str,
	kennitala_normalized: &str,
	election_id: Uuid,
	token_plain_hash: &str,
	ttl: chrono::Duration,
) -> Result<TokenRow, Error> {
	let now = Utc::now();
	let row: TokenRow = sqlx::query_as(
		r#"
		INSERT INTO tokens
			(token_id, member_uid, kennitala_normalized, election_id, token_plain_hash, created_at, expires_at, used)
		VALUES ($1, $2, $3, $4, $5, $6, $7, false)
		RETURNING token_id, member_uid, kennitala_normalized, election_id,
		          token_plain_hash, created_at, expires_at, used
		"#,
	)
	.bind(Uuid::new_v4())
	.bind(member_uid)
	.bind(kennitala_normalized)
	.bind(election_id)
	.bind(token_plain_hash)
	.bind(now)
	.bind(now + ttl)
	.fetch_one(&mut **tx)
	.await?;
	Ok(row)
}

pub async fn mark_used(pool: &PgPool, member_uid: &str, election_id: Uuid) -> Result<(), Error> {
	sqlx::query("UPDATE tokens SET used = true WHERE member_uid = $1 AND election_id = $2")
		.bind(member_uid)
		.bind(election_id)
		.execute(pool)
		.await?;
	Ok(())
}

pub async fn status(pool: &PgPool, member_uid: &str, election_id: Uuid) -> Result<TokenStatus, Error> {
	let row: Option<(bool, DateTime<Utc>)> =
		sqlx::query_as("SELECT used, expires_at FROM tokens WHERE member_uid = $1 AND election_id = $2")
			.bind(member_uid)
			.bind(election_id)
			.fetch_optional(pool)
			.await?;

	Ok(match row {
		Some((used, expires_at)) => TokenStatus { has_token: true, used, expires_at: Some(expires_at) },
		None => TokenStatus { has_token: false, used: false, expires_at: None },
	})
}

/// `reset mine`: deletes the caller's own token row. The Elections-side
/// deletion is requested separately by the caller via the S2S client.
pub async fn reset_mine(pool: &PgPool, member_uid: &str, election_id: Uuid) -> Result<u64, Error> {
	let result = sqlx::query("DELETE FROM tokens WHERE member_uid = $1 AND election_id = $2")
		.bind(member_uid)
		.bind(election_id)
		.execute(pool)
		.await?;
	Ok(result.rows_affected())
}

/// `reset all`: deletes every token row in this schema, across every
/// election. Gated at the HTTP layer by the deployment-mode opt-in flag.
pub async fn reset_all(pool: &PgPool) -> Result<u64, Error> {
	let result = sqlx::query("DELETE FROM tokens").execute(pool).await?;
	Ok(result.rows_affected())
}

/// Tokens issued more than `max_age` ago, never marked `used` — candidates
/// for the cross-service orphan sweep described in spec §5.
pub async fn expired_unused_older_than(pool: &PgPool, max_age: chrono::Duration) -> Result<Vec<TokenRow>, Error> {
	let cutoff = Utc::now() - max_age;
	let rows: Vec<TokenRow> = sqlx::query_as(
		r#"
		SELECT token_id, member_uid, kennitala_normalized, election_id,
		       token_plain_hash, created_at, expires_at, used
		FROM tokens
		WHERE used = false AND created_at < $1
		"#,
	)
	.bind(cutoff)
	.fetch_all(pool)
	.await?;
	Ok(rows)
}
