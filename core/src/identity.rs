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

//! The identity verifier is an external collaborator (spec §1); this module
//! defines only the slice of its interface the core depends on, plus an HTTP
//! client and a deterministic fake used by both services' test suites.

use crate::{error::Error, mask, role::RoleSet};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Identity {
	pub subject_id: String,
	pub member_uid: String,
	pub kennitala_normalized: Option<String>,
	pub is_member: bool,
	pub roles: RoleSet,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
	subject_id: String,
	member_uid: String,
	kennitala: Option<String>,
	is_member: bool,
	roles: Vec<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
	async fn verify(&self, bearer_credential: &str) -> Result<Identity, Error>;
}

/// Verifies a bearer credential against the organisation's identity
/// verifier over HTTP, with one bounded retry on timeout per spec §4.1.
pub struct HttpIdentityVerifier {
	client: reqwest::Client,
	base_url: String,
}

impl HttpIdentityVerifier {
	pub fn new(base_url: String, timeout: Duration) -> Self {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.expect("identity verifier http client config is valid");
		Self { client, base_url }
	}

	async fn verify_once(&self, bearer_credential: &str) -> Result<Identity, Error> {
		let response = self
			.client
			.get(format!("{}/verify", self.base_url))
			.bearer_auth(bearer_credential)
			.send()
			.await
			.map_err(|e| Error::DependencyFailure(format!("identity verifier unreachable: {e}")))?;

		if response.status() == reqwest::StatusCode::UNAUTHORIZED {
			return Err(Error::Unauthenticated);
		}
		if !response.status().is_success() {
			return Err(Error::DependencyFailure(format!(
				"identity verifier returned {}",
				response.status()
			)));
		}

		let body: VerifyResponse = response
			.json()
			.await
			.map_err(|e| Error::DependencyFailure(format!("identity verifier bad body: {e}")))?;

		let kennitala_normalized = match body.kennitala {
			Some(raw) => Some(
				mask::normalize_kennitala(&raw)
					.ok_or_else(|| Error::validation("kennitala", "not 10 digits after normalisation"))?,
			),
			None => None,
		};

		Ok(Identity {
			subject_id: body.subject_id,
			member_uid: body.member_uid,
			kennitala_normalized,
			is_member: body.is_member,
			roles: RoleSet::from_claims(body.roles.iter().map(String::as_str)),
		})
	}
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
	/// Bounded retry budget of one extra attempt on a dependency failure,
	/// per spec §4.1: "Identity verifier timeouts map to Unauthenticated
	/// after the bounded retry budget." A second consecutive failure is
	/// downgraded from DependencyFailure to Unauthenticated so callers don't
	/// have to distinguish "not logged in" from "verifier is flaky".
	async fn verify(&self, bearer_credential: &str) -> Result<Identity, Error> {
		match self.verify_once(bearer_credential).await {
			Ok(identity) => Ok(identity),
			Err(Error::Unauthenticated) => Err(Error::Unauthenticated),
			Err(Error::DependencyFailure(_)) => match self.verify_once(bearer_credential).await {
				Ok(identity) => Ok(identity),
				Err(_) => Err(Error::Unauthenticated),
			},
			Err(other) => Err(other),
		}
	}
}

/// A deterministic fixture verifier: bearer credentials of the form
/// `"{member_uid}:{kennitala}:{is_member}:{roles,comma,separated}"` decode
/// directly into an [`Identity`]. Used by integration tests for both
/// services so they don't need a live identity verifier.
#[derive(Default)]
pub struct FakeIdentityVerifier;

#[async_trait]
impl IdentityVerifier for FakeIdentityVerifier {
	async fn verify(&self, bearer_credential: &str) -> Result<Identity, Error> {
		let mut parts = bearer_credential.splitn(4, ':');
		let member_uid = parts.next().filter(|s| !s.is_empty()).ok_or(Error::Unauthenticated)?;
		let kennitala = parts.next().unwrap_or_default();
		let is_member = parts.next().unwrap_or("true") == "true";
		let roles = parts.next().unwrap_or_default();

		let kennitala_normalized = if kennitala.is_empty() {
			None
		} else {
			Some(mask::normalize_kennitala(kennitala).ok_or(Error::Unauthenticated)?)
		};

		Ok(Identity {
			subject_id: format!("subject:{member_uid}"),
			member_uid: member_uid.to_string(),
			kennitala_normalized,
			is_member,
			roles: RoleSet::from_claims(roles.split(',').filter(|s| !s.is_empty())),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::role::Role;

	#[tokio::test]
	async fn fake_verifier_round_trips_claims() {
		let verifier = FakeIdentityVerifier;
		let identity = verifier.verify("m-1:120180-3389:true:admin").await.unwrap();
		assert_eq!(identity.member_uid, "m-1");
		assert_eq!(identity.kennitala_normalized.as_deref(), Some("1201803389"));
		assert!(identity.is_member);
		assert!(identity.roles.has(Role::Admin));
	}

	#[tokio::test]
	async fn fake_verifier_rejects_empty_credential() {
		let verifier = FakeIdentityVerifier;
		assert!(matches!(verifier.verify("").await, Err(Error::Unauthenticated)));
	}
}
