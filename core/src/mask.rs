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

//! Masking helpers used by both the audit log and any log line that might
//! otherwise carry a kennitala or a raw token hash. These are the only
//! sanctioned way to put such values into a string that leaves the process.

/// Strips any non-digit separator from a kennitala and validates that
/// exactly 10 decimal digits remain.
pub fn normalize_kennitala(raw: &str) -> Option<String> {
	let digits: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
	if digits.len() == 10 && digits.chars().all(|c| c.is_ascii_digit()) {
		Some(digits)
	} else {
		None
	}
}

/// `123456-****`, per spec §4.4. Panics in debug builds on malformed input
/// since callers are expected to have normalized first; falls back to a
/// fully redacted string in release builds rather than leaking anything.
pub fn mask_kennitala(normalized: &str) -> String {
	if normalized.len() != 10 || !normalized.chars().all(|c| c.is_ascii_digit()) {
		debug_assert!(false, "mask_kennitala called with a non-normalized value");
		return "??????-****".to_string();
	}
	format!("{}-****", &normalized[..6])
}

/// First/last four hex chars of a token hash or other long opaque digest,
/// e.g. `a1b2…f9e0`.
pub fn mask_hash(hash: &str) -> String {
	if hash.len() <= 8 {
		return "*".repeat(hash.len());
	}
	format!("{}…{}", &hash[..4], &hash[hash.len() - 4..])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_separators() {
		assert_eq!(normalize_kennitala("120180-3389"), Some("1201803389".to_string()));
		assert_eq!(normalize_kennitala("1201803389"), Some("1201803389".to_string()));
		assert_eq!(normalize_kennitala("12018033"), None);
		assert_eq!(normalize_kennitala("abcdefghij"), None);
	}

	#[test]
	fn masks_kennitala() {
		assert_eq!(mask_kennitala("1201803389"), "120180-****");
	}

	#[test]
	fn masks_hash() {
		let hash = "a".repeat(64);
		let masked = mask_hash(&hash);
		assert!(masked.starts_with("aaaa"));
		assert!(!masked.contains(&hash));
	}

	#[test]
	fn never_leaks_full_value() {
		for raw in ["1201803389", &"b".repeat(64)] {
			let masked = if raw.len() == 10 { mask_kennitala(raw) } else { mask_hash(raw) };
			assert_ne!(masked, raw);
			assert!(masked.len() < raw.len() + 4);
		}
	}
}
