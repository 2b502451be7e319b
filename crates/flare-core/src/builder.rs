// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Constructs events from errors and messages.

use serde_json::{Map, Value as JsonValue};

use crate::event::{Event, Exception, Level};
use crate::location::SourceLocation;
use crate::value::{serialize_map, ErrorValue};

/// Key under which an error's serialized details are stored in `extra`.
pub const USER_INFO_KEY: &str = "user_info";

/// Builds an error-level event from an error and the location it was
/// captured at.
pub fn build_from_error(error: &ErrorValue, location: &SourceLocation) -> Event {
	let mut event = Event::new(
		format!("{}.{} in {}", error.domain, error.code, location.culprit()),
		Level::Error,
	);

	let user_info = error
		.user_info
		.as_ref()
		.map(serialize_map)
		.unwrap_or_else(Map::new);
	event
		.extra
		.insert_json(USER_INFO_KEY, JsonValue::Object(user_info));

	event.merge_source_location(location);
	event.exceptions = Some(vec![Exception {
		kind: error.domain.clone(),
		value: format!("{} ({})", error.domain, error.code),
	}]);
	event
}

/// Builds a minimal event carrying only a message and level.
pub fn build_from_message(message: impl Into<String>, level: Level) -> Event {
	Event::new(message, level)
}
