// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Breadcrumb types (diagnostic trail recorded before an error).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A timestamped trail entry leading up to an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
	pub timestamp: DateTime<Utc>,
	/// "http", "navigation", "ui", "console"
	pub category: String,
	pub message: Option<String>,
	pub level: BreadcrumbLevel,
	pub data: Map<String, JsonValue>,
}

impl Breadcrumb {
	pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			category: category.into(),
			message: Some(message.into()),
			..Default::default()
		}
	}

	pub fn with_level(mut self, level: BreadcrumbLevel) -> Self {
		self.level = level;
		self
	}

	pub fn with_data(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		self.data.insert(key.into(), value.into());
		self
	}

	/// Wire form of a single breadcrumb.
	pub fn to_json(&self) -> JsonValue {
		let mut crumb = json!({
			"timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
			"category": self.category,
			"level": self.level.to_string(),
		});
		if let Some(message) = &self.message {
			crumb["message"] = JsonValue::String(message.clone());
		}
		if !self.data.is_empty() {
			crumb["data"] = JsonValue::Object(self.data.clone());
		}
		crumb
	}
}

impl Default for Breadcrumb {
	fn default() -> Self {
		Self {
			timestamp: Utc::now(),
			category: String::new(),
			message: None,
			level: BreadcrumbLevel::Info,
			data: Map::new(),
		}
	}
}

/// Severity level of a breadcrumb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreadcrumbLevel {
	Debug,
	Info,
	Warning,
	Error,
	Critical,
}

impl fmt::Display for BreadcrumbLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Debug => write!(f, "debug"),
			Self::Info => write!(f, "info"),
			Self::Warning => write!(f, "warning"),
			Self::Error => write!(f, "error"),
			Self::Critical => write!(f, "critical"),
		}
	}
}

impl FromStr for BreadcrumbLevel {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"debug" => Ok(Self::Debug),
			"info" => Ok(Self::Info),
			"warning" => Ok(Self::Warning),
			"error" => Ok(Self::Error),
			"critical" => Ok(Self::Critical),
			_ => Err(CoreError::InvalidBreadcrumbLevel(s.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_to_json_omits_empty_fields() {
		let crumb = Breadcrumb {
			category: "ui".into(),
			..Default::default()
		};
		let json = crumb.to_json();
		assert_eq!(json["category"], "ui");
		assert_eq!(json["level"], "info");
		assert!(json.get("message").is_none());
		assert!(json.get("data").is_none());
	}

	#[test]
	fn test_to_json_includes_message_and_data() {
		let crumb = Breadcrumb::new("http", "GET /api/users")
			.with_level(BreadcrumbLevel::Warning)
			.with_data("status", 503);
		let json = crumb.to_json();
		assert_eq!(json["message"], "GET /api/users");
		assert_eq!(json["level"], "warning");
		assert_eq!(json["data"]["status"], 503);
	}

	#[test]
	fn test_unknown_level_is_rejected() {
		assert!(matches!(
			"loud".parse::<BreadcrumbLevel>(),
			Err(CoreError::InvalidBreadcrumbLevel(_))
		));
	}

	proptest! {
		#[test]
		fn breadcrumb_level_roundtrip(level in prop_oneof![
			Just(BreadcrumbLevel::Debug),
			Just(BreadcrumbLevel::Info),
			Just(BreadcrumbLevel::Warning),
			Just(BreadcrumbLevel::Error),
			Just(BreadcrumbLevel::Critical),
		]) {
			let s = level.to_string();
			let parsed: BreadcrumbLevel = s.parse().unwrap();
			prop_assert_eq!(level, parsed);
		}
	}
}
