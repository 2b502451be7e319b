// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Context carried by events: user identity, tags and extra data.
//!
//! [`Tags`] and [`Extra`] only ever hold values that are already valid JSON
//! (tags additionally only scalars). Every insertion goes through the strict
//! converter, so a rejected value leaves the map untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{CoreError, Result};
use crate::value::{to_json, Value};

/// User identity attached to events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	/// IP address (sensitive - not displayed by default)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ip_address: Option<String>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub data: Map<String, JsonValue>,
}

impl User {
	pub fn with_id(id: impl Into<String>) -> Self {
		Self {
			id: Some(id.into()),
			..Default::default()
		}
	}
}

/// Event tags: string keys mapped to JSON scalars.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, JsonValue>);

impl Tags {
	pub fn new() -> Self {
		Self::default()
	}

	/// Converts a whole map, or fails without producing anything.
	pub fn from_values(values: &BTreeMap<String, Value>) -> Result<Self> {
		values
			.iter()
			.map(|(key, value)| scalar_json(key, value).map(|json| (key.clone(), json)))
			.collect::<Result<BTreeMap<_, _>>>()
			.map(Self)
	}

	/// Inserts a tag, returning the previous value. Rejects values that are
	/// not JSON scalars.
	pub fn insert(
		&mut self,
		key: impl Into<String>,
		value: impl Into<Value>,
	) -> Result<Option<JsonValue>> {
		let key = key.into();
		let json = scalar_json(&key, &value.into())?;
		Ok(self.0.insert(key, json))
	}

	pub fn get(&self, key: &str) -> Option<&JsonValue> {
		self.0.get(key)
	}

	pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
		self.0.remove(key)
	}

	/// Applies `other` on top of these tags; `other` wins on conflicts.
	pub fn extend(&mut self, other: Tags) {
		self.0.extend(other.0);
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

fn scalar_json(key: &str, value: &Value) -> Result<JsonValue> {
	let json = to_json(value)?;
	if json.is_array() || json.is_object() {
		return Err(CoreError::TagNotScalar {
			key: key.to_string(),
		});
	}
	Ok(json)
}

/// Free-form extra data: string keys mapped to any JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Extra(Map<String, JsonValue>);

impl Extra {
	pub fn new() -> Self {
		Self::default()
	}

	/// Converts a whole map, or fails without producing anything.
	pub fn from_values(values: &BTreeMap<String, Value>) -> Result<Self> {
		values
			.iter()
			.map(|(key, value)| {
				to_json(value)
					.map(|json| (key.clone(), json))
					.map_err(CoreError::from)
			})
			.collect::<Result<Map<_, _>>>()
			.map(Self)
	}

	/// Inserts an entry, returning the previous value. Rejects values that
	/// have no exact JSON form.
	pub fn insert(
		&mut self,
		key: impl Into<String>,
		value: impl Into<Value>,
	) -> Result<Option<JsonValue>> {
		let json = to_json(&value.into())?;
		Ok(self.0.insert(key.into(), json))
	}

	/// Inserts an already-valid JSON value.
	pub fn insert_json(&mut self, key: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
		self.0.insert(key.into(), value)
	}

	pub fn get(&self, key: &str) -> Option<&JsonValue> {
		self.0.get(key)
	}

	pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
		self.0.remove(key)
	}

	/// Applies `other` on top of this data; `other` wins on conflicts.
	pub fn extend(&mut self, other: Extra) {
		self.0.extend(other.0);
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
