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

//! Centralises the role hierarchy so that no handler has to know about role
//! aliases. `admin` and `meeting_election_manager` are the same claim as
//! `election_manager` by design decision (see DESIGN.md); everything else is
//! rejected rather than silently trusted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	Member,
	EventManager,
	ElectionManager,
	Admin,
	Developer,
}

impl Role {
	/// Parses a raw claim string from the identity verifier, collapsing known
	/// aliases onto a single canonical role. Unknown strings are dropped
	/// rather than granted power, per the spec's open question in DESIGN.md.
	pub fn parse(raw: &str) -> Option<Role> {
		match raw {
			"member" => Some(Role::Member),
			"event_manager" => Some(Role::EventManager),
			"election_manager" | "meeting_election_manager" => Some(Role::ElectionManager),
			"admin" => Some(Role::Admin),
			"developer" | "superuser" => Some(Role::Developer),
			_ => None,
		}
	}

	/// Roles that this role implies having, i.e. the subordinate roles it is
	/// a recognised superset of (`developer` ⊇ `admin` ⊇ `election_manager` ⊇
	/// `member`). `event_manager` sits outside that chain: it is neither a
	/// superset nor a subset of `election_manager`.
	fn implies(self) -> &'static [Role] {
		match self {
			Role::Developer => &[Role::Developer, Role::Admin, Role::ElectionManager, Role::Member],
			Role::Admin => &[Role::Admin, Role::ElectionManager, Role::Member],
			Role::ElectionManager => &[Role::ElectionManager, Role::Member],
			Role::EventManager => &[Role::EventManager, Role::Member],
			Role::Member => &[Role::Member],
		}
	}
}

/// A caller's resolved, de-duplicated role set, closed under `implies`.
#[derive(Debug, Clone, Default)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
	pub fn from_claims<'a>(raw: impl IntoIterator<Item = &'a str>) -> Self {
		let mut set = BTreeSet::new();
		for raw_role in raw {
			if let Some(role) = Role::parse(raw_role) {
				set.extend(role.implies().iter().copied());
			}
		}
		Self(set)
	}

	pub fn has(&self, role: Role) -> bool {
		self.0.contains(&role)
	}

	/// True if the caller's roles satisfy any of the declared acceptable
	/// roles for a protected operation.
	pub fn satisfies_any(&self, required: &[Role]) -> bool {
		required.iter().any(|role| self.has(*role))
	}

	pub fn is_management(&self) -> bool {
		self.has(Role::ElectionManager) || self.has(Role::Admin) || self.has(Role::Developer)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn admin_implies_election_manager_and_member() {
		let roles = RoleSet::from_claims(["admin"]);
		assert!(roles.has(Role::Admin));
		assert!(roles.has(Role::ElectionManager));
		assert!(roles.has(Role::Member));
		assert!(!roles.has(Role::Developer));
	}

	#[test]
	fn aliases_collapse_to_the_same_role() {
		let a = RoleSet::from_claims(["meeting_election_manager"]);
		let b = RoleSet::from_claims(["election_manager"]);
		assert!(a.has(Role::ElectionManager));
		assert!(b.has(Role::ElectionManager));
	}

	#[test]
	fn unknown_roles_grant_nothing() {
		let roles = RoleSet::from_claims(["wizard"]);
		assert!(!roles.has(Role::Member));
		assert!(!roles.satisfies_any(&[Role::Member]));
	}

	#[test]
	fn stripping_a_role_never_grants_access() {
		let full = RoleSet::from_claims(["admin"]);
		let stripped = RoleSet::from_claims(["member"]);
		assert!(full.satisfies_any(&[Role::Admin]));
		assert!(!stripped.satisfies_any(&[Role::Admin]));
	}
}
