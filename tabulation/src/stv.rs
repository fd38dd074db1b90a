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

//! Single Transferable Vote tabulation (spec §4.3 "STV / ranked-choice").
//! Implements the Droop/Hare quota, fractional Gregory surplus transfer,
//! and the preceding-round-standing tie-break policy, halting with
//! [`StvOutcome::TieUnresolved`] when a tie survives that check.

use ekklesia_core::error::Error;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Quota {
	Droop,
	Hare,
}

pub fn quota(non_empty_ballots: u64, seats: u32, method: Quota) -> u64 {
	let v = non_empty_ballots as f64;
	let s = seats as f64;
	match method {
		Quota::Droop => (v / (s + 1.0)).floor() as u64 + 1,
		Quota::Hare => (v / s).ceil() as u64,
	}
}

#[derive(Debug, Clone, Serialize)]
pub enum RoundAction {
	Elected { candidate: String, transferred: f64 },
	Eliminated { candidate: String, transferred: f64 },
	ElectedRemaining { candidates: Vec<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct Round {
	pub totals: Vec<(String, f64)>,
	pub action: RoundAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct StvResult {
	pub quota: u64,
	pub elected: Vec<String>,
	pub rounds: Vec<Round>,
}

struct Parcel {
	weight: f64,
	ranking: Vec<String>,
	pointer: usize,
}

impl Parcel {
	/// Advances `pointer` past any candidate no longer in play, returning the
	/// candidate this parcel currently counts toward, or `None` if the
	/// ballot is exhausted.
	fn current(&mut self, active: &std::collections::BTreeSet<String>) -> Option<String> {
		while self.pointer < self.ranking.len() {
			let candidate = &self.ranking[self.pointer];
			if active.contains(candidate) {
				return Some(candidate.clone());
			}
			self.pointer += 1;
		}
		None
	}
}

/// Runs STV to fill `seats` from `ballots` (one [`crate::RankedBallot`] per
/// vote) over `candidates`. Returns `Ok(StvResult)` on a clean outcome or
/// `Err(Error::TieUnresolved)` the moment a tie can't be broken by the
/// preceding-round-standing rule.
pub fn tabulate(
	ballots: &[Vec<String>],
	candidates: &[String],
	seats: u32,
	quota_method: Quota,
) -> Result<StvResult, Error> {
	let non_empty: Vec<&Vec<String>> = ballots.iter().filter(|b| !b.is_empty()).collect();
	let q = quota(non_empty.len() as u64, seats, quota_method);

	let mut parcels: Vec<Parcel> =
		non_empty.into_iter().map(|b| Parcel { weight: 1.0, ranking: b.clone(), pointer: 0 }).collect();

	let mut active: std::collections::BTreeSet<String> = candidates.iter().cloned().collect();
	let mut elected: Vec<String> = Vec::new();
	let mut rounds: Vec<Round> = Vec::new();
	let mut previous_totals: BTreeMap<String, f64> = BTreeMap::new();

	loop {
		if elected.len() as u32 == seats {
			break;
		}
		if active.len() as u32 + elected.len() as u32 <= seats {
			// Spec: "stop when only S candidates remain" — elect everyone left.
			let mut remaining: Vec<String> = active.iter().cloned().collect();
			remaining.sort();
			let totals = current_totals(&mut parcels, &active);
			rounds.push(Round { totals, action: RoundAction::ElectedRemaining { candidates: remaining.clone() } });
			elected.extend(remaining);
			break;
		}

		let totals_map: BTreeMap<String, f64> = {
			let totals = current_totals(&mut parcels, &active);
			totals.into_iter().collect()
		};
		let totals_vec: Vec<(String, f64)> =
			totals_map.iter().map(|(k, v)| (k.clone(), *v)).collect::<Vec<_>>();

		let leaders: Vec<&String> = totals_map.iter().filter(|(_, v)| **v >= q as f64).map(|(k, _)| k).collect();

		if !leaders.is_empty() {
			let winner = pick_extreme(&leaders, &totals_map, &previous_totals, true)?;
			let total = totals_map[&winner];
			let factor = if total > 0.0 { (total - q as f64) / total } else { 0.0 };
			let mut transferred = 0.0;
			for parcel in parcels.iter_mut() {
				if parcel.current(&active).as_deref() == Some(winner.as_str()) {
					transferred += parcel.weight * factor;
					parcel.weight *= factor;
					parcel.pointer += 1;
				}
			}
			active.remove(&winner);
			elected.push(winner.clone());
			rounds.push(Round {
				totals: totals_vec,
				action: RoundAction::Elected { candidate: winner, transferred },
			});
		} else {
			let min = totals_map.values().cloned().fold(f64::INFINITY, f64::min);
			let losers: Vec<&String> = totals_map.iter().filter(|(_, v)| **v == min).map(|(k, _)| k).collect();
			let loser = pick_extreme(&losers, &totals_map, &previous_totals, false)?;
			let mut transferred = 0.0;
			for parcel in parcels.iter_mut() {
				if parcel.current(&active).as_deref() == Some(loser.as_str()) {
					transferred += parcel.weight;
					parcel.pointer += 1;
				}
			}
			active.remove(&loser);
			rounds.push(Round { totals: totals_vec, action: RoundAction::Eliminated { candidate: loser, transferred } });
		}

		previous_totals = totals_map;
	}

	Ok(StvResult { quota: q, elected, rounds })
}

fn current_totals(parcels: &mut [Parcel], active: &std::collections::BTreeSet<String>) -> Vec<(String, f64)> {
	let mut totals: BTreeMap<String, f64> = active.iter().map(|c| (c.clone(), 0.0)).collect();
	for parcel in parcels.iter_mut() {
		if let Some(candidate) = parcel.current(active) {
			*totals.entry(candidate).or_insert(0.0) += parcel.weight;
		}
	}
	totals.into_iter().collect()
}

/// Picks the single candidate to act on among `tied`, using the
/// preceding round's standing to break ties (spec §4.3 tie-break policy).
/// `prefer_high` selects the candidate with the higher preceding standing
/// when electing; electing and eliminating both resolve in favour of the
/// higher-standing candidate (eliminate the other).
fn pick_extreme(
	tied: &[&String],
	current: &BTreeMap<String, f64>,
	previous: &BTreeMap<String, f64>,
	prefer_high: bool,
) -> Result<String, Error> {
	if tied.len() == 1 {
		return Ok(tied[0].clone());
	}
	// Current-round count already picks out the extreme; among those tied at
	// that extreme, use the previous round's standing to break further.
	let mut by_previous: Vec<(&&String, f64)> =
		tied.iter().map(|c| (c, previous.get(c.as_str()).copied().unwrap_or(0.0))).collect();
	by_previous.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

	let best = by_previous[0].1;
	let still_tied: Vec<&&String> = by_previous.iter().filter(|(_, v)| *v == best).map(|(c, _)| *c).collect();

	if still_tied.len() == 1 {
		let candidate = if prefer_high { still_tied[0] } else { tied.iter().find(|c| *c != still_tied[0]).unwrap() };
		return Ok((*candidate).clone());
	}

	let mut names: Vec<String> = tied.iter().map(|c| (*c).clone()).collect();
	names.sort();
	let _ = current;
	Err(Error::TieUnresolved { candidates: names })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidates(n: usize) -> Vec<String> {
		(0..n).map(|i| format!("c{i}")).collect()
	}

	#[test]
	fn droop_quota_matches_the_textbook_formula() {
		// 100 ballots, 2 seats: floor(100/3) + 1 = 34.
		assert_eq!(quota(100, 2, Quota::Droop), 34);
	}

	#[test]
	fn hare_quota_matches_the_textbook_formula() {
		// 100 ballots, 3 seats: ceil(100/3) = 34.
		assert_eq!(quota(100, 3, Quota::Hare), 34);
	}

	#[test]
	fn a_first_preference_majority_wins_a_single_seat_outright() {
		let ballots = vec![
			vec!["c0".to_string()],
			vec!["c0".to_string()],
			vec!["c0".to_string()],
			vec!["c1".to_string()],
		];
		let result = tabulate(&ballots, &candidates(2), 1, Quota::Droop).unwrap();
		assert_eq!(result.elected, vec!["c0".to_string()]);
	}

	#[test]
	fn surplus_transfers_to_next_preference_by_the_gregory_fraction() {
		let ballots = vec![
			vec!["c0".to_string(), "c1".to_string()],
			vec!["c0".to_string(), "c1".to_string()],
			vec!["c0".to_string(), "c2".to_string()],
			vec!["c2".to_string()],
		];
		// quota for 4 ballots / 2 seats = floor(4/3)+1 = 2.
		let result = tabulate(&ballots, &candidates(3), 2, Quota::Droop).unwrap();
		assert!(result.elected.contains(&"c0".to_string()));
		assert_eq!(result.elected.len(), 2);
	}

	#[test]
	fn elimination_transfers_the_full_weight_onward() {
		let ballots = vec![
			vec!["c0".to_string()],
			vec!["c1".to_string()],
			vec!["c1".to_string()],
			vec!["c1".to_string()],
			vec!["c2".to_string(), "c1".to_string()],
			vec!["c2".to_string(), "c1".to_string()],
		];
		let result = tabulate(&ballots, &candidates(3), 1, Quota::Droop).unwrap();
		assert_eq!(result.elected, vec!["c1".to_string()]);
	}

	#[test]
	fn filling_the_last_seats_from_the_remaining_field_does_not_require_quota() {
		let ballots = vec![vec!["c0".to_string()], vec!["c1".to_string()]];
		let result = tabulate(&ballots, &candidates(2), 2, Quota::Droop).unwrap();
		let mut elected = result.elected.clone();
		elected.sort();
		assert_eq!(elected, vec!["c0".to_string(), "c1".to_string()]);
	}

	#[test]
	fn conservation_of_weight_within_each_round() {
		let ballots = vec![
			vec!["c0".to_string(), "c1".to_string()],
			vec!["c0".to_string(), "c1".to_string()],
			vec!["c1".to_string()],
		];
		let result = tabulate(&ballots, &candidates(3), 1, Quota::Droop).unwrap();
		for round in &result.rounds {
			let total: f64 = round.totals.iter().map(|(_, w)| w).sum();
			assert!(total <= ballots.len() as f64 + 1e-9);
		}
	}

	#[test]
	fn an_unbreakable_tie_halts_with_tie_unresolved() {
		// Two candidates for one seat, one vote each, no preceding round to
		// break the tie on elimination.
		let ballots = vec![vec!["c0".to_string()], vec!["c1".to_string()]];
		let result = tabulate(&ballots, &candidates(2), 1, Quota::Droop);
		assert!(matches!(result, Err(Error::TieUnresolved { .. })));
	}
}
