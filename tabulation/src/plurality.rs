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

//! Single-choice tabulation (spec §4.3 "Plurality / single-choice").

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PluralityResult {
	/// Vote count per answer id, in descending-count order (ties broken by
	/// answer id for a stable, reproducible ordering — not a tie-break of
	/// the election itself).
	pub counts: Vec<(String, u64)>,
	/// All answer ids sharing the maximum count. A single winner has one
	/// element; a tie has more than one and is reported rather than broken,
	/// per spec.
	pub winners: Vec<String>,
	pub total_ballots: u64,
}

/// `ballots` is one answer id per cast ballot; an election's full
/// `answers` list, not just the ones that received votes.
pub fn tabulate(ballots: &[String], answers: &[String]) -> PluralityResult {
	let mut tally: BTreeMap<&str, u64> = answers.iter().map(|a| (a.as_str(), 0)).collect();
	for answer_id in ballots {
		*tally.entry(answer_id.as_str()).or_insert(0) += 1;
	}

	let mut counts: Vec<(String, u64)> = tally.into_iter().map(|(id, n)| (id.to_string(), n)).collect();
	counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

	let max = counts.first().map(|(_, n)| *n).unwrap_or(0);
	let winners = counts.iter().filter(|(_, n)| *n == max && max > 0).map(|(id, _)| id.clone()).collect();

	PluralityResult { counts, winners, total_ballots: ballots.len() as u64 }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn answers() -> Vec<String> {
		vec!["a".into(), "b".into(), "c".into()]
	}

	#[test]
	fn a_clear_majority_wins_outright() {
		let ballots = vec!["a".into(), "a".into(), "b".into()];
		let result = tabulate(&ballots, &answers());
		assert_eq!(result.winners, vec!["a".to_string()]);
		assert_eq!(result.total_ballots, 3);
	}

	#[test]
	fn a_tie_reports_every_tied_candidate() {
		let ballots = vec!["a".into(), "b".into()];
		let result = tabulate(&ballots, &answers());
		let mut winners = result.winners.clone();
		winners.sort();
		assert_eq!(winners, vec!["a".to_string(), "b".to_string()]);
	}

	#[test]
	fn zero_ballots_yields_no_winner() {
		let result = tabulate(&[], &answers());
		assert!(result.winners.is_empty());
	}

	#[test]
	fn every_declared_answer_appears_in_counts_even_with_zero_votes() {
		let ballots = vec!["a".into()];
		let result = tabulate(&ballots, &answers());
		assert_eq!(result.counts.len(), 3);
	}
}
