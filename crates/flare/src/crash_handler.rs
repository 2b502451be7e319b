// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sink that mirrors client context for crash-time reporting.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use flare_core::{User, Value};
use serde_json::Value as JsonValue;

/// Receives the client's context whenever it changes.
///
/// A crash handler cannot query the client at crash time, so the client
/// pushes every change to it. Implementations are called while the client
/// holds its own locks and must not call back into the client.
pub trait CrashHandler: Send + Sync {
	/// Called once when the handler is installed on a client.
	fn start(&self) {}

	fn set_breadcrumbs(&self, breadcrumbs: &JsonValue);

	fn set_tags(&self, tags: &BTreeMap<String, Value>);

	fn set_extra(&self, extra: &BTreeMap<String, Value>);

	fn set_user(&self, user: Option<Arc<User>>);

	fn set_release(&self, release: Option<&str>);
}

/// Slot shared between the client and the breadcrumb observer.
pub(crate) type CrashHandlerSlot = Arc<RwLock<Option<Arc<dyn CrashHandler>>>>;

/// Runs `f` against the installed handler, if any.
pub(crate) fn with_handler(slot: &CrashHandlerSlot, f: impl FnOnce(&dyn CrashHandler)) {
	let guard = slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
	if let Some(handler) = guard.as_ref() {
		f(handler.as_ref());
	}
}
