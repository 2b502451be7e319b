// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The event record and its wire format.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::context::{Extra, Tags, User};
use crate::error::{CoreError, Result};
use crate::location::SourceLocation;

/// SDK name reported in every event.
pub const SDK_NAME: &str = "flare-rust";
/// SDK version reported in every event.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Platform reported in every event.
pub const PLATFORM: &str = "rust";

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
	Debug,
	Info,
	Warning,
	Error,
	Fatal,
}

impl fmt::Display for Level {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Debug => write!(f, "debug"),
			Self::Info => write!(f, "info"),
			Self::Warning => write!(f, "warning"),
			Self::Error => write!(f, "error"),
			Self::Fatal => write!(f, "fatal"),
		}
	}
}

impl FromStr for Level {
	type Err = CoreError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"debug" => Ok(Self::Debug),
			"info" => Ok(Self::Info),
			"warning" => Ok(Self::Warning),
			"error" => Ok(Self::Error),
			"fatal" => Ok(Self::Fatal),
			_ => Err(CoreError::InvalidLevel(s.to_string())),
		}
	}
}

/// Unique identifier of an event, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.simple())
	}
}

impl FromStr for EventId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// A single stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
	pub filename: String,
	pub function: String,
	pub lineno: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stacktrace {
	pub frames: Vec<Frame>,
}

/// An exception entry: `{type, value}` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
	#[serde(rename = "type")]
	pub kind: String,
	pub value: String,
}

/// A structured report ready for transmission.
///
/// `tags` and `extra` can only hold valid JSON (see [`Tags`] and [`Extra`]),
/// so an event is always serializable at the moment of send.
#[derive(Debug, Clone)]
pub struct Event {
	pub event_id: EventId,
	pub timestamp: DateTime<Utc>,
	pub message: String,
	pub level: Level,
	pub culprit: Option<String>,
	pub stacktrace: Option<Stacktrace>,
	pub exceptions: Option<Vec<Exception>>,
	pub tags: Tags,
	pub extra: Extra,
	pub user: Option<Arc<User>>,
	pub release: Option<String>,
	pub breadcrumbs: Option<JsonValue>,
}

impl Event {
	/// Creates an event with only a message and level set.
	pub fn new(message: impl Into<String>, level: Level) -> Self {
		Self {
			event_id: EventId::new(),
			timestamp: Utc::now(),
			message: message.into(),
			level,
			culprit: None,
			stacktrace: None,
			exceptions: None,
			tags: Tags::new(),
			extra: Extra::new(),
			user: None,
			release: None,
			breadcrumbs: None,
		}
	}

	/// Sets the culprit and stacktrace from a source location.
	pub fn merge_source_location(&mut self, location: &SourceLocation) {
		self.culprit = Some(location.culprit().to_string());
		self.stacktrace = Some(location.stacktrace().clone());
	}

	/// Renders the wire representation.
	pub fn to_json(&self) -> Result<JsonValue> {
		Ok(serde_json::to_value(EventPayload::from(self))?)
	}

	/// Serializes the wire representation to bytes for transport or storage.
	pub fn to_payload(&self) -> Result<Vec<u8>> {
		Ok(serde_json::to_vec(&EventPayload::from(self))?)
	}
}

#[derive(Serialize)]
struct SdkInfo {
	name: &'static str,
	version: &'static str,
}

#[derive(Serialize)]
struct EventPayload<'a> {
	event_id: String,
	timestamp: String,
	platform: &'static str,
	sdk: SdkInfo,
	message: &'a str,
	level: Level,
	#[serde(skip_serializing_if = "Option::is_none")]
	culprit: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	stacktrace: Option<&'a Stacktrace>,
	#[serde(rename = "exception", skip_serializing_if = "Option::is_none")]
	exceptions: Option<&'a [Exception]>,
	tags: &'a Tags,
	extra: &'a Extra,
	#[serde(skip_serializing_if = "Option::is_none")]
	user: Option<&'a User>,
	#[serde(skip_serializing_if = "Option::is_none")]
	release: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	breadcrumbs: Option<&'a JsonValue>,
}

impl<'a> From<&'a Event> for EventPayload<'a> {
	fn from(event: &'a Event) -> Self {
		Self {
			event_id: event.event_id.to_string(),
			timestamp: event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
			platform: PLATFORM,
			sdk: SdkInfo {
				name: SDK_NAME,
				version: SDK_VERSION,
			},
			message: &event.message,
			level: event.level,
			culprit: event.culprit.as_deref(),
			stacktrace: event.stacktrace.as_ref(),
			exceptions: event.exceptions.as_deref(),
			tags: &event.tags,
			extra: &event.extra,
			user: event.user.as_deref(),
			release: event.release.as_deref(),
			breadcrumbs: event.breadcrumbs.as_ref(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn test_minimal_event_wire_shape() {
		let event = Event::new("hello", Level::Info);
		let json = event.to_json().unwrap();

		assert_eq!(json["message"], "hello");
		assert_eq!(json["level"], "info");
		assert_eq!(json["platform"], "rust");
		assert_eq!(json["sdk"]["name"], SDK_NAME);
		assert_eq!(json["tags"], json!({}));
		assert_eq!(json["extra"], json!({}));
		assert_eq!(json["event_id"].as_str().unwrap().len(), 32);
		for absent in ["culprit", "stacktrace", "exception", "user", "release", "breadcrumbs"] {
			assert!(json.get(absent).is_none(), "{absent} should be omitted");
		}
	}

	#[test]
	fn test_full_event_wire_shape() {
		let mut event = Event::new("boom", Level::Error);
		event.merge_source_location(&SourceLocation::new("src/main.rs", 7, "main"));
		event.exceptions = Some(vec![Exception {
			kind: "io".to_string(),
			value: "io (5)".to_string(),
		}]);
		event.tags.insert("env", "prod").unwrap();
		event.extra.insert("attempt", 3).unwrap();
		event.user = Some(Arc::new(User::with_id("u1")));
		event.release = Some("1.2.3".to_string());
		event.breadcrumbs = Some(json!({"values": []}));

		let json = event.to_json().unwrap();
		assert_eq!(json["culprit"], "main.rs:7 main");
		assert_eq!(
			json["stacktrace"],
			json!({"frames": [{"filename": "main.rs", "function": "main", "lineno": 7}]})
		);
		assert_eq!(json["exception"], json!([{"type": "io", "value": "io (5)"}]));
		assert_eq!(json["tags"], json!({"env": "prod"}));
		assert_eq!(json["extra"], json!({"attempt": 3}));
		assert_eq!(json["user"], json!({"id": "u1"}));
		assert_eq!(json["release"], "1.2.3");
		assert_eq!(json["breadcrumbs"], json!({"values": []}));
	}

	#[test]
	fn test_payload_is_json_bytes() {
		let event = Event::new("bytes", Level::Warning);
		let payload = event.to_payload().unwrap();
		let parsed: JsonValue = serde_json::from_slice(&payload).unwrap();
		assert_eq!(parsed["level"], "warning");
	}

	#[test]
	fn test_levels_are_ordered_by_severity() {
		assert!(Level::Debug < Level::Info);
		assert!(Level::Error < Level::Fatal);
	}

	proptest! {
		#[test]
		fn level_roundtrip(level in prop_oneof![
			Just(Level::Debug),
			Just(Level::Info),
			Just(Level::Warning),
			Just(Level::Error),
			Just(Level::Fatal),
		]) {
			let parsed: Level = level.to_string().parse().unwrap();
			prop_assert_eq!(level, parsed);
		}

		#[test]
		fn event_id_roundtrip(uuid_bytes in any::<[u8; 16]>()) {
			let id = EventId(Uuid::from_bytes(uuid_bytes));
			let parsed: EventId = id.to_string().parse().unwrap();
			prop_assert_eq!(id, parsed);
		}
	}
}
