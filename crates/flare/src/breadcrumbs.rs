// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded breadcrumb trail with change notification.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use flare_core::Breadcrumb;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

/// Default number of breadcrumbs kept.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 20;

/// Called with the serialized trail after every mutation.
pub type BreadcrumbObserver = Arc<dyn Fn(&JsonValue) + Send + Sync>;

/// Ordered, bounded log of recent breadcrumbs.
///
/// Holds at most `capacity` entries; recording beyond that evicts the oldest.
/// Mutation and notification happen under one lock, so observers see
/// snapshots in mutation order. Observers must not call back into the store.
pub struct BreadcrumbStore {
	capacity: usize,
	state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
	crumbs: VecDeque<Breadcrumb>,
	observer: Option<BreadcrumbObserver>,
}

impl StoreState {
	fn serialized(&self) -> JsonValue {
		let values: Vec<JsonValue> = self.crumbs.iter().map(Breadcrumb::to_json).collect();
		json!({ "values": values })
	}

	fn notify(&self) {
		if let Some(observer) = &self.observer {
			observer(&self.serialized());
		}
	}
}

impl BreadcrumbStore {
	/// Creates a store holding at most `capacity` breadcrumbs. A capacity of
	/// zero keeps nothing but still notifies on every record.
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			state: Mutex::new(StoreState::default()),
		}
	}

	/// Registers the change observer, replacing any previous one.
	pub fn set_observer(&self, observer: BreadcrumbObserver) {
		self.lock().observer = Some(observer);
	}

	/// Appends a breadcrumb, evicting the oldest entries beyond capacity.
	pub fn record(&self, breadcrumb: Breadcrumb) {
		let mut state = self.lock();
		state.crumbs.push_back(breadcrumb);
		while state.crumbs.len() > self.capacity {
			if let Some(evicted) = state.crumbs.pop_front() {
				debug!(category = %evicted.category, "evicted oldest breadcrumb");
			}
		}
		state.notify();
	}

	/// Removes all breadcrumbs.
	pub fn clear(&self) {
		let mut state = self.lock();
		state.crumbs.clear();
		state.notify();
	}

	/// Serialized trail: `{"values": [...]}` in insertion order.
	pub fn serialized(&self) -> JsonValue {
		self.lock().serialized()
	}

	/// Sends the current trail to the observer without changing it. The call
	/// is ordered with concurrent records, so the observer never ends on a
	/// stale trail.
	pub fn notify_now(&self) {
		self.lock().notify();
	}

	/// Returns the serialized trail and clears the store in one step, so no
	/// breadcrumb recorded concurrently is lost between the two.
	pub fn take_serialized(&self) -> JsonValue {
		let mut state = self.lock();
		let snapshot = state.serialized();
		state.crumbs.clear();
		state.notify();
		snapshot
	}

	/// Copies of the current breadcrumbs, oldest first.
	pub fn snapshot(&self) -> Vec<Breadcrumb> {
		self.lock().crumbs.iter().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.lock().crumbs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().crumbs.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	fn lock(&self) -> MutexGuard<'_, StoreState> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

impl Default for BreadcrumbStore {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_BREADCRUMBS)
	}
}
