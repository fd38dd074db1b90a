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

//! S2S client used by Events to register token hashes with Elections
//! (spec §4.1 step 5, §5 ordering guarantees). One retry with jitter on a
//! dependency failure, matching the identity verifier's retry budget.

use async_trait::async_trait;
use ekklesia_core::{error::Error, s2s};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

#[async_trait]
pub trait ElectionsClient: Send + Sync {
	async fn register_token(&self, election_id: Uuid, token_hash: &str) -> Result<(), Error>;
	async fn delete_token_for_member(&self, election_id: Uuid, member_uid: &str) -> Result<(), Error>;
}

pub struct HttpElectionsClient {
	client: reqwest::Client,
	base_url: String,
	shared_secret: String,
}

impl HttpElectionsClient {
	pub fn new(base_url: String, shared_secret: String, timeout: Duration) -> Self {
		let client = reqwest::Client::builder().timeout(timeout).build().expect("elections client http config is valid");
		Self { client, base_url, shared_secret }
	}

	async fn register_once(&self, election_id: Uuid, token_hash: &str) -> Result<(), Error> {
		#[derive(Serialize)]
		struct Body<'a> {
			election_id: Uuid,
			token_hash: &'a str,
		}

		let response = self
			.client
			.post(format!("{}/s2s/v1/token", self.base_url))
			.header(s2s::S2S_SECRET_HEADER, &self.shared_secret)
			.json(&Body { election_id, token_hash })
			.send()
			.await
			.map_err(|e| Error::DependencyFailure(format!("elections service unreachable: {e}")))?;

		if response.status().is_success() {
			Ok(())
		} else {
			Err(Error::DependencyFailure(format!("elections service returned {}", response.status())))
		}
	}
}

#[async_trait]
impl ElectionsClient for HttpElectionsClient {
	/// Spec §4.1: "S2S registration failures are retried at most once with
	/// jitter, then surfaced to the caller."
	async fn register_token(&self, election_id: Uuid, token_hash: &str) -> Result<(), Error> {
		match self.register_once(election_id, token_hash).await {
			Ok(()) => Ok(()),
			Err(_) => {
				let jitter_ms = rand::thread_rng().gen_range(50..=250);
				tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
				self.register_once(election_id, token_hash).await
			},
		}
	}

	async fn delete_token_for_member(&self, _election_id: Uuid, _member_uid: &str) -> Result<(), Error> {
		// Elections has no member-addressed deletion endpoint; `reset mine`
		// only deletes the Events-side row and relies on the orphan sweep to
		// reap the Elections-side registration (spec §5).
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct AlwaysFails;

	#[async_trait]
	impl ElectionsClient for AlwaysFails {
		async fn register_token(&self, _election_id: Uuid, _token_hash: &str) -> Result<(), Error> {
			Err(Error::DependencyFailure("down".into()))
		}

		async fn delete_token_for_member(&self, _election_id: Uuid, _member_uid: &str) -> Result<(), Error> {
			Err(Error::DependencyFailure("down".into()))
		}
	}

	#[tokio::test]
	async fn a_fake_client_surfaces_dependency_failures() {
		let client = AlwaysFails;
		let result = client.register_token(Uuid::new_v4(), "hash").await;
		assert!(matches!(result, Err(Error::DependencyFailure(_))));
	}
}
