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

//! Multi-choice tabulation (spec §4.3 "Approval / multi-choice").

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApprovalResult {
	pub counts: Vec<(String, u64)>,
	/// The top `max_selections` answer ids by count. When the count at the
	/// cutoff is tied across more than one answer, every tied answer is
	/// included, so this vec may exceed `max_selections` in length — the
	/// tie is surfaced, not silently broken.
	pub winners: Vec<String>,
	pub total_ballots: u64,
}

/// `selections` is one inner vec per ballot, each holding every answer id
/// that ballot selected (spec: "one ballot may carry multiple selections").
pub fn tabulate(selections: &[Vec<String>], answers: &[String], max_selections: usize) -> ApprovalResult {
	let mut tally: BTreeMap<&str, u64> = answers.iter().map(|a| (a.as_str(), 0)).collect();
	for ballot in selections {
		for answer_id in ballot {
			*tally.entry(answer_id.as_str()).or_insert(0) += 1;
		}
	}

	let mut counts: Vec<(String, u64)> = tally.into_iter().map(|(id, n)| (id.to_string(), n)).collect();
	counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

	let cutoff_count = counts.get(max_selections.saturating_sub(1).min(counts.len().saturating_sub(1))).map(|(_, n)| *n);
	let winners = match cutoff_count {
		Some(cutoff) if cutoff > 0 => counts.iter().filter(|(_, n)| *n >= cutoff).map(|(id, _)| id.clone()).collect(),
		_ => vec![],
	};

	ApprovalResult { counts, winners, total_ballots: selections.len() as u64 }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn answers() -> Vec<String> {
		vec!["a".into(), "b".into(), "c".into(), "d".into()]
	}

	#[test]
	fn top_n_by_count_are_selected() {
		let selections = vec![
			vec!["a".to_string(), "b".to_string()],
			vec!["a".to_string(), "c".to_string()],
			vec!["b".to_string()],
		];
		let result = tabulate(&selections, &answers(), 2);
		let mut winners = result.winners.clone();
		winners.sort();
		assert_eq!(winners, vec!["a".to_string(), "b".to_string()]);
	}

	#[test]
	fn a_tie_at_the_cutoff_includes_every_tied_answer() {
		let selections = vec![vec!["a".to_string()], vec!["b".to_string()], vec!["c".to_string()]];
		let result = tabulate(&selections, &answers(), 1);
		let mut winners = result.winners.clone();
		winners.sort();
		assert_eq!(winners, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
	}

	#[test]
	fn no_ballots_yields_no_winners() {
		let result = tabulate(&[], &answers(), 2);
		assert!(result.winners.is_empty());
	}
}
