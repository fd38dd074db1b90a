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

//! Pure tabulation algorithms for the four voting types of spec §4.3:
//! plurality (single-choice), approval (multi-choice), STV (ranked-choice),
//! and the nomination-committee variant of STV. Every function here takes
//! plain in-memory ballots and returns a deterministic result; the calling
//! service is responsible for fetching ballots from the store and for
//! access control around when results may be shown.

pub mod approval;
pub mod committee;
pub mod plurality;
pub mod stv;

/// A ranked ballot: an ordered, deduplicated sequence of answer ids,
/// highest preference first. Partial rankings (fewer than all candidates)
/// are valid per spec §4.3.
pub type RankedBallot = Vec<String>;
