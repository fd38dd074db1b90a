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

//! A small structured-concurrency helper: the HTTP listener, the scheduler
//! loop, and the orphan-token sweep are all spawned into one [`Scope`]. If
//! any of them returns an error, the others are aborted rather than left
//! running against a process that is already failing (spec §5: "no
//! long-held background work outlives the request").

use futures::future::BoxFuture;
use std::future::Future;
use tokio::task::JoinHandle;

pub struct Scope<E> {
	handles: std::sync::Mutex<Vec<JoinHandle<Result<(), E>>>>,
}

impl<E> Scope<E>
where
	E: Send + 'static,
{
	fn new() -> Self {
		Self { handles: std::sync::Mutex::new(Vec::new()) }
	}

	/// Spawns a task into the scope. Its failure will cause `task_scope` to
	/// return that error once the root future and all spawned tasks have
	/// been awaited.
	pub fn spawn<F>(&self, fut: F)
	where
		F: Future<Output = Result<(), E>> + Send + 'static,
	{
		self.handles.lock().unwrap().push(tokio::spawn(fut));
	}
}

/// Runs `body`, which receives a [`Scope`] to spawn cooperating tasks into.
/// Once the root future resolves, every spawned task is aborted; if any of
/// them had already failed, that error is returned in preference to the
/// root's own result.
pub async fn task_scope<E, F>(body: F) -> Result<(), E>
where
	E: Send + 'static,
	F: for<'b> FnOnce(&'b Scope<E>) -> BoxFuture<'b, Result<(), E>>,
{
	let scope: Scope<E> = Scope::new();
	let root_result = body(&scope).await;

	let handles = std::mem::take(&mut *scope.handles.lock().unwrap());
	for handle in &handles {
		handle.abort();
	}
	let mut first_task_error = None;
	for handle in handles {
		if let Ok(Err(err)) = handle.await {
			first_task_error.get_or_insert(err);
		}
	}
	match first_task_error {
		Some(err) => Err(err),
		None => root_result,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::FutureExt;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;

	#[tokio::test]
	async fn root_future_error_propagates() {
		let result: Result<(), &'static str> =
			task_scope(|_scope| async move { Err("boom") }.boxed()).await;
		assert_eq!(result, Err("boom"));
	}

	#[tokio::test]
	async fn spawned_tasks_are_aborted_when_root_returns() {
		let ran_to_completion = Arc::new(AtomicBool::new(false));
		let flag = ran_to_completion.clone();
		let result: Result<(), &'static str> = task_scope(|scope| {
			scope.spawn(async move {
				tokio::time::sleep(std::time::Duration::from_secs(5)).await;
				flag.store(true, Ordering::SeqCst);
				Ok(())
			});
			async move { Ok(()) }.boxed()
		})
		.await;
		assert_eq!(result, Ok(()));
		assert!(!ran_to_completion.load(Ordering::SeqCst));
	}
}
