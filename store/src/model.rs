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

//! The Elections-schema domain model (spec §3). Row structs mirror the
//! tables `sqlx` queries against; enums are stored as Postgres `text` and
//! validated at the Rust layer plus the database's own check constraint.

use chrono::{DateTime, Utc};
use ekklesia_core::error::Error;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum VotingType {
	SingleChoice,
	MultiChoice,
	RankedChoice,
	NominationCommittee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
	All,
	Members,
	Admins,
	Committee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
	Draft,
	Published,
	Paused,
	Closed,
	Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RankedMethod {
	Stv,
	Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuotaType {
	Droop,
	Hare,
	None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
	pub id: String,
	pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Election {
	pub id: Uuid,
	pub title: String,
	pub question: String,
	pub answers: Vec<Answer>,
	pub voting_type: VotingType,
	pub max_selections: i32,
	pub seats_to_fill: i32,
	pub eligibility: Eligibility,
	pub committee_member_uids: Vec<String>,
	pub status: ElectionStatus,
	pub hidden: bool,
	pub scheduled_start: Option<DateTime<Utc>>,
	pub scheduled_end: Option<DateTime<Utc>>,
	pub preserve_voter_identity: bool,
	pub requires_justification: bool,
	pub justification_required_for_top_n: i32,
	pub ranked_method: Option<RankedMethod>,
	pub quota_type: Option<QuotaType>,
	pub round_number: i32,
	pub parent_election_id: Option<Uuid>,
	pub created_by: String,
	pub updated_by: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// A draft-or-update payload; distinct from [`Election`] because callers
/// never set `id`/timestamps/audit fields directly.
#[derive(Debug, Clone, Deserialize)]
pub struct ElectionDraft {
	pub title: String,
	pub question: String,
	pub answers: Vec<Answer>,
	pub voting_type: VotingType,
	pub max_selections: i32,
	pub seats_to_fill: i32,
	pub eligibility: Eligibility,
	#[serde(default)]
	pub committee_member_uids: Vec<String>,
	#[serde(default)]
	pub hidden: bool,
	pub scheduled_start: Option<DateTime<Utc>>,
	pub scheduled_end: Option<DateTime<Utc>>,
	#[serde(default)]
	pub preserve_voter_identity: bool,
	#[serde(default)]
	pub requires_justification: bool,
	#[serde(default)]
	pub justification_required_for_top_n: i32,
	pub ranked_method: Option<RankedMethod>,
	pub quota_type: Option<QuotaType>,
}

/// Enforces the validation predicate of spec §4.2, defaulting
/// `ranked_method`/`quota_type` in place where the spec says to. Returns the
/// offending field on the first violation found; partial updates that fail
/// validation must never be persisted.
pub fn validate_and_normalize(draft: &mut ElectionDraft) -> Result<(), Error> {
	if draft.answers.len() < 2 {
		return Err(Error::validation("answers", "an election needs at least two answers"));
	}
	let answer_count = draft.answers.len() as i32;

	match draft.voting_type {
		VotingType::SingleChoice => {
			if draft.max_selections != 1 || draft.seats_to_fill != 1 {
				return Err(Error::validation(
					"max_selections",
					"single-choice elections require max_selections = 1 and seats_to_fill = 1",
				));
			}
		},
		VotingType::MultiChoice => {
			if !(1..=answer_count).contains(&draft.max_selections) {
				return Err(Error::validation(
					"max_selections",
					"multi-choice max_selections must be between 1 and the number of answers",
				));
			}
			if draft.seats_to_fill != draft.max_selections {
				return Err(Error::validation(
					"seats_to_fill",
					"multi-choice seats_to_fill must equal max_selections",
				));
			}
		},
		VotingType::RankedChoice => {
			if !(1..answer_count).contains(&draft.seats_to_fill) {
				return Err(Error::validation(
					"seats_to_fill",
					"ranked-choice seats_to_fill must be at least 1 and less than the number of answers",
				));
			}
			if draft.max_selections != answer_count {
				return Err(Error::validation(
					"max_selections",
					"ranked-choice max_selections must equal the number of answers",
				));
			}
			let ranked_method = draft.ranked_method.unwrap_or(RankedMethod::Stv);
			draft.ranked_method = Some(ranked_method);
			draft.quota_type = Some(match ranked_method {
				RankedMethod::Simple => QuotaType::None,
				RankedMethod::Stv => draft.quota_type.unwrap_or(QuotaType::Droop),
			});
		},
		VotingType::NominationCommittee => {
			if draft.eligibility != Eligibility::Committee {
				return Err(Error::validation(
					"eligibility",
					"nomination-committee elections must have eligibility = committee",
				));
			}
			if draft.committee_member_uids.is_empty() {
				return Err(Error::validation(
					"committee_member_uids",
					"nomination-committee elections require a non-empty committee",
				));
			}
			draft.preserve_voter_identity = true;
			if draft.max_selections != answer_count {
				return Err(Error::validation(
					"max_selections",
					"nomination-committee max_selections must equal the number of answers",
				));
			}
		},
	}

	if draft.eligibility == Eligibility::Committee && draft.committee_member_uids.is_empty() {
		return Err(Error::validation(
			"committee_member_uids",
			"eligibility = committee requires a non-empty committee",
		));
	}

	if let (Some(start), Some(end)) = (draft.scheduled_start, draft.scheduled_end) {
		if start >= end {
			return Err(Error::validation("scheduled_end", "scheduled_end must be after scheduled_start"));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn answers(n: usize) -> Vec<Answer> {
		(0..n).map(|i| Answer { id: format!("a{i}"), text: format!("Answer {i}") }).collect()
	}

	fn base_draft(voting_type: VotingType, answers_count: usize) -> ElectionDraft {
		ElectionDraft {
			title: "T".into(),
			question: "Q".into(),
			answers: answers(answers_count),
			voting_type,
			max_selections: 1,
			seats_to_fill: 1,
			eligibility: Eligibility::All,
			committee_member_uids: vec![],
			hidden: false,
			scheduled_start: None,
			scheduled_end: None,
			preserve_voter_identity: false,
			requires_justification: false,
			justification_required_for_top_n: 0,
			ranked_method: None,
			quota_type: None,
		}
	}

	#[test]
	fn single_choice_forces_one_and_one() {
		let mut draft = base_draft(VotingType::SingleChoice, 3);
		assert!(validate_and_normalize(&mut draft).is_ok());
		draft.max_selections = 2;
		assert!(validate_and_normalize(&mut draft).is_err());
	}

	#[test]
	fn multi_choice_requires_seats_equal_max_selections() {
		let mut draft = base_draft(VotingType::MultiChoice, 4);
		draft.max_selections = 2;
		draft.seats_to_fill = 2;
		assert!(validate_and_normalize(&mut draft).is_ok());
		draft.seats_to_fill = 3;
		assert!(validate_and_normalize(&mut draft).is_err());
	}

	#[test]
	fn ranked_choice_defaults_stv_and_droop() {
		let mut draft = base_draft(VotingType::RankedChoice, 4);
		draft.seats_to_fill = 2;
		draft.max_selections = 4;
		validate_and_normalize(&mut draft).unwrap();
		assert_eq!(draft.ranked_method, Some(RankedMethod::Stv));
		assert_eq!(draft.quota_type, Some(QuotaType::Droop));
	}

	#[test]
	fn ranked_choice_simple_forces_quota_none() {
		let mut draft = base_draft(VotingType::RankedChoice, 4);
		draft.seats_to_fill = 2;
		draft.max_selections = 4;
		draft.ranked_method = Some(RankedMethod::Simple);
		draft.quota_type = Some(QuotaType::Droop);
		validate_and_normalize(&mut draft).unwrap();
		assert_eq!(draft.quota_type, Some(QuotaType::None));
	}

	#[test]
	fn nomination_committee_requires_committee_eligibility_and_members() {
		let mut draft = base_draft(VotingType::NominationCommittee, 3);
		draft.max_selections = 3;
		draft.eligibility = Eligibility::Committee;
		assert!(validate_and_normalize(&mut draft).is_err(), "empty committee should fail");
		draft.committee_member_uids = vec!["u1".into()];
		assert!(validate_and_normalize(&mut draft).is_ok());
		assert!(draft.preserve_voter_identity);
	}

	#[test]
	fn schedule_start_must_precede_end() {
		let mut draft = base_draft(VotingType::SingleChoice, 2);
		let now = Utc::now();
		draft.scheduled_start = Some(now);
		draft.scheduled_end = Some(now - chrono::Duration::seconds(1));
		assert!(validate_and_normalize(&mut draft).is_err());
	}

	#[test]
	fn validation_is_idempotent_on_an_already_valid_draft() {
		let mut draft = base_draft(VotingType::RankedChoice, 5);
		draft.seats_to_fill = 2;
		draft.max_selections = 5;
		validate_and_normalize(&mut draft).unwrap();
		let once = draft.clone();
		validate_and_normalize(&mut draft).unwrap();
		assert_eq!(once.ranked_method, draft.ranked_method);
		assert_eq!(once.quota_type, draft.quota_type);
	}
}
