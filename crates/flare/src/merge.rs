// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Applies client-wide context onto events.
//!
//! Rules, in order:
//! 1. Fatal events get no client context.
//! 2. User and release fall back to the client's only when the event has none.
//! 3. Client tags are merged only if the whole map converts to JSON scalars.
//! 4. Client extra is merged only if the whole map converts to JSON.
//! 5. Error events take the breadcrumb trail, which clears the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use flare_core::{Event, Extra, Level, Tags, User, Value};
use tracing::debug;

use crate::breadcrumbs::BreadcrumbStore;

/// Client-wide defaults applied to captured events.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
	pub user: Option<Arc<User>>,
	pub release: Option<String>,
	pub tags: BTreeMap<String, Value>,
	pub extra: BTreeMap<String, Value>,
}

/// The event's own user if present, otherwise the client's.
pub fn resolve_user(own: Option<Arc<User>>, client: Option<&Arc<User>>) -> Option<Arc<User>> {
	own.or_else(|| client.cloned())
}

/// The event's own release if present, otherwise the client's.
pub fn resolve_release(own: Option<String>, client: Option<&str>) -> Option<String> {
	own.or_else(|| client.map(str::to_string))
}

/// Applies all merge rules to `event`.
pub fn apply(event: &mut Event, context: &ClientContext, breadcrumbs: &BreadcrumbStore) {
	if event.level == Level::Fatal {
		debug!(event_id = %event.event_id, "fatal event, not applying client context");
		return;
	}
	apply_context(event, context);
	attach_breadcrumbs(event, breadcrumbs);
}

/// Rules 2-4: user, release, tags and extra. Does nothing for fatal events.
pub fn apply_context(event: &mut Event, context: &ClientContext) {
	if event.level == Level::Fatal {
		return;
	}

	event.user = resolve_user(event.user.take(), context.user.as_ref());
	event.release = resolve_release(event.release.take(), context.release.as_deref());

	match Tags::from_values(&context.tags) {
		Ok(tags) => event.tags.extend(tags),
		Err(e) => {
			debug!(
				event_id = %event.event_id,
				reason = %e,
				"client tags are not JSON-serializable, skipping merge"
			);
		}
	}

	match Extra::from_values(&context.extra) {
		Ok(extra) => event.extra.extend(extra),
		Err(e) => {
			debug!(
				event_id = %event.event_id,
				reason = %e,
				"client extra is not JSON-serializable, skipping merge"
			);
		}
	}
}

/// Rule 5: error-level events consume the breadcrumb trail.
pub fn attach_breadcrumbs(event: &mut Event, breadcrumbs: &BreadcrumbStore) {
	if event.level == Level::Error {
		event.breadcrumbs = Some(breadcrumbs.take_serialized());
	}
}
