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

//! Per-IP, per-operation windowed rate limiting (spec §4.4). Separate
//! buckets for authentication, token issuance, ballot submission, and admin
//! reset, matching this codebase's read-mostly-cache idiom: the limiter's
//! state is a single `Mutex`-guarded map replaced in place per request
//! rather than shared mutable state reached into by name from elsewhere.

use crate::error::Error;
use std::{
	collections::HashMap,
	net::IpAddr,
	sync::Mutex,
	time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
	Authentication,
	TokenIssuance,
	BallotSubmission,
	AdminReset,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
	pub max_requests: u32,
	pub window: Duration,
}

impl RateLimitRule {
	pub const fn new(max_requests: u32, window_secs: u64) -> Self {
		Self { max_requests, window: Duration::from_secs(window_secs) }
	}
}

struct Window {
	started_at: Instant,
	count: u32,
}

pub struct RateLimiter {
	rules: HashMap<Operation, RateLimitRule>,
	windows: Mutex<HashMap<(IpAddr, Operation), Window>>,
}

impl RateLimiter {
	pub fn new(rules: HashMap<Operation, RateLimitRule>) -> Self {
		Self { rules, windows: Mutex::new(HashMap::new()) }
	}

	/// Default rule set: generous enough not to trip integration tests,
	/// tight enough to be a meaningful guardrail in production.
	pub fn with_defaults() -> Self {
		let mut rules = HashMap::new();
		rules.insert(Operation::Authentication, RateLimitRule::new(20, 60));
		rules.insert(Operation::TokenIssuance, RateLimitRule::new(5, 60));
		rules.insert(Operation::BallotSubmission, RateLimitRule::new(10, 60));
		rules.insert(Operation::AdminReset, RateLimitRule::new(3, 60));
		Self::new(rules)
	}

	/// Consumes one request against `ip`'s bucket for `operation`. Returns
	/// `TooManyRequests` with a retry hint once the bucket's window is full.
	pub fn check(&self, ip: IpAddr, operation: Operation) -> Result<(), Error> {
		let Some(rule) = self.rules.get(&operation) else {
			return Ok(());
		};
		let mut windows = self.windows.lock().unwrap();
		let now = Instant::now();
		let window = windows.entry((ip, operation)).or_insert_with(|| Window { started_at: now, count: 0 });

		if now.duration_since(window.started_at) >= rule.window {
			window.started_at = now;
			window.count = 0;
		}

		if window.count >= rule.max_requests {
			let retry_after = rule.window.saturating_sub(now.duration_since(window.started_at));
			return Err(Error::TooManyRequests { retry_after_secs: retry_after.as_secs().max(1) });
		}

		window.count += 1;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn allows_up_to_the_limit_then_breaches() {
		let mut rules = HashMap::new();
		rules.insert(Operation::TokenIssuance, RateLimitRule::new(2, 60));
		let limiter = RateLimiter::new(rules);
		let ip: IpAddr = "127.0.0.1".parse().unwrap();

		assert!(limiter.check(ip, Operation::TokenIssuance).is_ok());
		assert!(limiter.check(ip, Operation::TokenIssuance).is_ok());
		let breach = limiter.check(ip, Operation::TokenIssuance);
		assert!(matches!(breach, Err(Error::TooManyRequests { .. })));
	}

	#[test]
	fn buckets_are_independent_per_operation_and_ip() {
		let mut rules = HashMap::new();
		rules.insert(Operation::TokenIssuance, RateLimitRule::new(1, 60));
		let limiter = RateLimiter::new(rules);
		let ip_a: IpAddr = "10.0.0.1".parse().unwrap();
		let ip_b: IpAddr = "10.0.0.2".parse().unwrap();

		assert!(limiter.check(ip_a, Operation::TokenIssuance).is_ok());
		assert!(limiter.check(ip_b, Operation::TokenIssuance).is_ok());
		assert!(limiter.check(ip_a, Operation::TokenIssuance).is_err());
	}

	#[test]
	fn unconfigured_operation_is_unlimited() {
		let limiter = RateLimiter::new(HashMap::new());
		let ip: IpAddr = "127.0.0.1".parse().unwrap();
		for _ in 0..100 {
			assert!(limiter.check(ip, Operation::BallotSubmission).is_ok());
		}
	}
}
