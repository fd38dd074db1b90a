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

//! Service-to-service auth: a shared secret carried in the
//! `x-s2s-secret` header (spec §4.3's "S2S only; auth by shared secret
//! header"). Comparison is constant-time so the header can't be brute
//! forced a byte at a time via response-timing.

use crate::error::Error;
use warp::{http::HeaderValue, Filter, Rejection};

pub const S2S_SECRET_HEADER: &str = "x-s2s-secret";

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	if a.len() != b.len() {
		return false;
	}
	a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// A warp filter that rejects the request unless it carries the expected
/// shared secret.
pub fn require_shared_secret(
	expected: String,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
	warp::header::optional::<String>(S2S_SECRET_HEADER).and_then(move |provided: Option<String>| {
		let expected = expected.clone();
		async move {
			match provided {
				Some(provided) if constant_time_eq(provided.as_bytes(), expected.as_bytes()) => Ok(()),
				_ => Err(warp::reject::custom(Error::Unauthenticated)),
			}
		}
	})
	.untuple_one()
}

pub fn header_value(secret: &str) -> HeaderValue {
	HeaderValue::from_str(secret).expect("s2s secret must be a valid header value")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn constant_time_eq_matches_equal_secrets() {
		assert!(constant_time_eq(b"secret", b"secret"));
	}

	#[test]
	fn constant_time_eq_rejects_mismatches() {
		assert!(!constant_time_eq(b"secret", b"wrong!"));
		assert!(!constant_time_eq(b"secret", b"secre"));
	}
}
