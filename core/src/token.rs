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

//! Voting-token generation and hashing (spec §4.1 step 4). Shared by both
//! services: Events mints and hashes; Elections re-hashes the plaintext
//! presented on the legacy ballot path to look up its registration.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// 256 bits of CSPRNG output, comfortably over the spec's 128-bit floor,
/// hex-encoded for transport as a bearer-style string.
pub fn generate_plaintext_token() -> String {
	let mut bytes = [0u8; 32];
	rand::thread_rng().fill_bytes(&mut bytes);
	hex::encode(bytes)
}

/// `token_hash = SHA-256(plaintext)`, hex-encoded to the 64-char digest
/// both schemas key on.
pub fn hash_token(plaintext: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(plaintext.as_bytes());
	hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generated_tokens_are_unique_and_long_enough() {
		let a = generate_plaintext_token();
		let b = generate_plaintext_token();
		assert_ne!(a, b);
		// 32 bytes hex-encoded = 64 chars = 256 bits, well over the 128-bit floor.
		assert_eq!(a.len(), 64);
	}

	#[test]
	fn hash_is_deterministic_and_64_hex_chars() {
		let plaintext = generate_plaintext_token();
		let h1 = hash_token(&plaintext);
		let h2 = hash_token(&plaintext);
		assert_eq!(h1, h2);
		assert_eq!(h1.len(), 64);
		assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn different_plaintexts_hash_differently() {
		assert_ne!(hash_token("a"), hash_token("b"));
	}
}
