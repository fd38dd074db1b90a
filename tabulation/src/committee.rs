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

//! Nomination-committee tabulation (spec §4.3): STV over identity-carrying
//! ballots, rendered with voter identity and per-candidate justification,
//! plus an auxiliary mean-rank/first-place report.

use crate::stv::{self, Quota, StvResult};
use ekklesia_core::error::Error;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct CommitteeBallot {
	pub voter_member_uid: String,
	pub ranking: Vec<String>,
	/// One justification string per top-ranked candidate, keyed by
	/// candidate id (spec §4.3 step 6: "one per top-ranked candidate").
	pub justifications: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateAux {
	pub candidate: String,
	pub mean_rank: f64,
	pub first_place_votes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JustificationEntry {
	pub voter_member_uid: String,
	pub candidate: String,
	pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeResult {
	pub stv: StvResult,
	pub auxiliary: Vec<CandidateAux>,
	pub justifications: Vec<JustificationEntry>,
}

pub fn tabulate(ballots: &[CommitteeBallot], candidates: &[String], seats: u32) -> Result<CommitteeResult, Error> {
	let rankings: Vec<Vec<String>> = ballots.iter().map(|b| b.ranking.clone()).collect();
	let stv = stv::tabulate(&rankings, candidates, seats, Quota::Droop)?;

	let auxiliary = auxiliary_report(ballots, candidates);

	let mut justifications = Vec::new();
	for ballot in ballots {
		for (candidate, text) in &ballot.justifications {
			justifications.push(JustificationEntry {
				voter_member_uid: ballot.voter_member_uid.clone(),
				candidate: candidate.clone(),
				text: text.clone(),
			});
		}
	}

	Ok(CommitteeResult { stv, auxiliary, justifications })
}

/// Mean rank (1-indexed position; unranked = not counted) and first-place
/// vote count per candidate, independent of the STV outcome itself.
fn auxiliary_report(ballots: &[CommitteeBallot], candidates: &[String]) -> Vec<CandidateAux> {
	let mut rank_sum: BTreeMap<&str, (u64, u64)> = candidates.iter().map(|c| (c.as_str(), (0, 0))).collect();
	let mut first_place: BTreeMap<&str, u64> = candidates.iter().map(|c| (c.as_str(), 0)).collect();

	for ballot in ballots {
		for (position, candidate) in ballot.ranking.iter().enumerate() {
			if let Some((sum, count)) = rank_sum.get_mut(candidate.as_str()) {
				*sum += position as u64 + 1;
				*count += 1;
			}
			if position == 0 {
				if let Some(count) = first_place.get_mut(candidate.as_str()) {
					*count += 1;
				}
			}
		}
	}

	candidates
		.iter()
		.map(|c| {
			let (sum, count) = rank_sum[c.as_str()];
			let mean_rank = if count > 0 { sum as f64 / count as f64 } else { 0.0 };
			CandidateAux { candidate: c.clone(), mean_rank, first_place_votes: first_place[c.as_str()] }
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ballot(voter: &str, ranking: &[&str]) -> CommitteeBallot {
		CommitteeBallot {
			voter_member_uid: voter.to_string(),
			ranking: ranking.iter().map(|s| s.to_string()).collect(),
			justifications: BTreeMap::new(),
		}
	}

	#[test]
	fn mean_rank_and_first_place_are_computed_per_candidate() {
		let ballots = vec![ballot("u1", &["a", "b"]), ballot("u2", &["b", "a"])];
		let candidates = vec!["a".to_string(), "b".to_string()];
		let report = auxiliary_report(&ballots, &candidates);
		let a = report.iter().find(|c| c.candidate == "a").unwrap();
		let b = report.iter().find(|c| c.candidate == "b").unwrap();
		assert_eq!(a.mean_rank, 1.5);
		assert_eq!(b.mean_rank, 1.5);
		assert_eq!(a.first_place_votes, 1);
		assert_eq!(b.first_place_votes, 1);
	}

	#[test]
	fn justifications_are_carried_through_with_voter_identity() {
		let mut ballots = vec![ballot("u1", &["a"])];
		ballots[0].justifications.insert("a".to_string(), "well qualified".to_string());
		let candidates = vec!["a".to_string(), "b".to_string()];
		let result = tabulate(&ballots, &candidates, 1).unwrap();
		assert_eq!(result.justifications.len(), 1);
		assert_eq!(result.justifications[0].voter_member_uid, "u1");
		assert_eq!(result.justifications[0].text, "well qualified");
	}
}
