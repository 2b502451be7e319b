// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured context values and their conversion to JSON.
//!
//! [`Value`] is the closed set of shapes the SDK knows how to report: scalars,
//! URLs, error-like values, sequences, mappings, and an opaque escape hatch.
//! Two conversions are provided:
//!
//! - [`serialize`] is total. Anything that has no JSON form is replaced by its
//!   string rendering, and anything nested deeper than [`MAX_DEPTH`] becomes
//!   [`MAX_DEPTH_SENTINEL`].
//! - [`to_json`] performs the same walk but fails instead of substituting. It
//!   answers "is this value JSON-serializable as a whole".

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Number, Value as JsonValue};
use tracing::debug;
use url::Url;

use crate::error::SerializationError;

/// Maximum number of nested containers walked before substituting a sentinel.
pub const MAX_DEPTH: usize = 32;

/// Replaces any value nested deeper than [`MAX_DEPTH`].
pub const MAX_DEPTH_SENTINEL: &str = "[max depth exceeded]";

/// A reportable value.
#[derive(Debug, Clone)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	UInt(u64),
	Float(f64),
	String(String),
	Url(Url),
	Error(Box<ErrorValue>),
	Sequence(Vec<Value>),
	Mapping(BTreeMap<String, Value>),
	/// A value with no JSON shape. Reported through its `Debug` rendering.
	Other(Opaque),
}

impl Value {
	/// Wraps an arbitrary value that has no structured representation.
	pub fn other<T>(value: T) -> Self
	where
		T: fmt::Debug + Send + Sync + 'static,
	{
		Value::Other(Opaque(Arc::new(value)))
	}

	/// Returns true for null, booleans, numbers and strings.
	pub fn is_scalar(&self) -> bool {
		matches!(
			self,
			Value::Null
				| Value::Bool(_)
				| Value::Int(_)
				| Value::UInt(_)
				| Value::Float(_)
				| Value::String(_)
		)
	}
}

/// Shared handle to a value that can only be rendered with `Debug`.
#[derive(Clone)]
pub struct Opaque(Arc<dyn fmt::Debug + Send + Sync>);

impl fmt::Debug for Opaque {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// An error described by a domain, a numeric code and nested details.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
	pub domain: String,
	pub code: i64,
	pub user_info: Option<BTreeMap<String, Value>>,
}

impl ErrorValue {
	pub fn new(domain: impl Into<String>, code: i64) -> Self {
		Self {
			domain: domain.into(),
			code,
			user_info: None,
		}
	}

	pub fn with_user_info(mut self, user_info: BTreeMap<String, Value>) -> Self {
		self.user_info = Some(user_info);
		self
	}

	/// Adds a single detail entry, creating the map if needed.
	pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self
			.user_info
			.get_or_insert_with(BTreeMap::new)
			.insert(key.into(), value.into());
		self
	}

	/// Describes a Rust error.
	///
	/// The domain is the error's type name. `std::io::Error` reports its OS
	/// error code, every other type reports 0. The details carry the display
	/// text and, following `source()`, the underlying error.
	pub fn from_error<E>(error: &E) -> Self
	where
		E: StdError + 'static,
	{
		let mut value = Self::describe(error as &(dyn StdError + 'static));
		value.domain = std::any::type_name::<E>().to_string();
		value
	}

	/// Describes a type-erased error. The domain is taken from the leading
	/// identifier of its `Debug` output.
	pub fn from_dyn_error(error: &(dyn StdError + 'static)) -> Self {
		Self::describe(error)
	}

	fn describe(error: &(dyn StdError + 'static)) -> Self {
		let code = error
			.downcast_ref::<std::io::Error>()
			.and_then(std::io::Error::raw_os_error)
			.map(i64::from)
			.unwrap_or(0);

		let mut value = Self::new(debug_type_name(error), code)
			.with_info("description", error.to_string());
		if let Some(source) = error.source() {
			value = value.with_info("underlying_error", Self::describe(source));
		}
		value
	}
}

fn debug_type_name(error: &dyn StdError) -> String {
	let rendered = format!("{error:?}");
	let end = rendered
		.find(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
		.unwrap_or(rendered.len());
	match &rendered[..end] {
		"" => "Error".to_string(),
		name => name.to_string(),
	}
}

/// Converts a value to JSON, substituting fallbacks where needed. Never fails.
pub fn serialize(value: &Value) -> JsonValue {
	convert(value, 0, Policy::Substitute).unwrap_or(JsonValue::Null)
}

/// Converts a mapping to a JSON object, substituting fallbacks where needed.
pub fn serialize_map(map: &BTreeMap<String, Value>) -> Map<String, JsonValue> {
	map.iter()
		.map(|(key, value)| {
			let json = convert(value, 1, Policy::Substitute).unwrap_or(JsonValue::Null);
			(key.clone(), json)
		})
		.collect()
}

/// Converts a value to JSON, failing on anything that has no exact JSON form.
pub fn to_json(value: &Value) -> Result<JsonValue, SerializationError> {
	convert(value, 0, Policy::Reject)
}

#[derive(Debug, Clone, Copy)]
enum Policy {
	Substitute,
	Reject,
}

impl Policy {
	fn fallback(
		self,
		reason: SerializationError,
		substitute: impl FnOnce() -> JsonValue,
	) -> Result<JsonValue, SerializationError> {
		match self {
			Policy::Reject => Err(reason),
			Policy::Substitute => {
				debug!(reason = %reason, "substituting fallback for value without a JSON form");
				Ok(substitute())
			}
		}
	}
}

fn convert(value: &Value, depth: usize, policy: Policy) -> Result<JsonValue, SerializationError> {
	if depth > MAX_DEPTH {
		return policy.fallback(SerializationError::TooDeep { max: MAX_DEPTH }, || {
			JsonValue::String(MAX_DEPTH_SENTINEL.to_string())
		});
	}

	match value {
		Value::Null => Ok(JsonValue::Null),
		Value::Bool(b) => Ok(JsonValue::Bool(*b)),
		Value::Int(i) => Ok(JsonValue::Number((*i).into())),
		Value::UInt(u) => Ok(JsonValue::Number((*u).into())),
		Value::Float(f) => match Number::from_f64(*f) {
			Some(n) => Ok(JsonValue::Number(n)),
			None => policy.fallback(SerializationError::NonFinite(*f), || {
				JsonValue::String(f.to_string())
			}),
		},
		Value::String(s) => Ok(JsonValue::String(s.clone())),
		Value::Url(url) => Ok(JsonValue::String(url.as_str().to_string())),
		Value::Error(error) => {
			let user_info = match &error.user_info {
				Some(info) => convert_map(info, depth + 1, policy)?,
				None => Map::new(),
			};
			let mut object = Map::new();
			object.insert("domain".to_string(), JsonValue::String(error.domain.clone()));
			object.insert("code".to_string(), JsonValue::Number(error.code.into()));
			object.insert("user_info".to_string(), JsonValue::Object(user_info));
			Ok(JsonValue::Object(object))
		}
		Value::Sequence(items) => items
			.iter()
			.map(|item| convert(item, depth + 1, policy))
			.collect::<Result<Vec<_>, _>>()
			.map(JsonValue::Array),
		Value::Mapping(map) => convert_map(map, depth + 1, policy).map(JsonValue::Object),
		Value::Other(opaque) => {
			let rendered = format!("{opaque:?}");
			policy.fallback(SerializationError::Unsupported(rendered.clone()), || {
				JsonValue::String(rendered)
			})
		}
	}
}

fn convert_map(
	map: &BTreeMap<String, Value>,
	depth: usize,
	policy: Policy,
) -> Result<Map<String, JsonValue>, SerializationError> {
	map.iter()
		.map(|(key, value)| convert(value, depth, policy).map(|json| (key.clone(), json)))
		.collect()
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s)
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<i32> for Value {
	fn from(i: i32) -> Self {
		Value::Int(i.into())
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}

impl From<u32> for Value {
	fn from(u: u32) -> Self {
		Value::UInt(u.into())
	}
}

impl From<u64> for Value {
	fn from(u: u64) -> Self {
		Value::UInt(u)
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Value::Float(f)
	}
}

impl From<Url> for Value {
	fn from(url: Url) -> Self {
		Value::Url(url)
	}
}

impl From<ErrorValue> for Value {
	fn from(error: ErrorValue) -> Self {
		Value::Error(Box::new(error))
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Value::Sequence(items.into_iter().map(Into::into).collect())
	}
}

impl From<BTreeMap<String, Value>> for Value {
	fn from(map: BTreeMap<String, Value>) -> Self {
		Value::Mapping(map)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or(Value::Null)
	}
}

impl From<JsonValue> for Value {
	fn from(json: JsonValue) -> Self {
		match json {
			JsonValue::Null => Value::Null,
			JsonValue::Bool(b) => Value::Bool(b),
			JsonValue::Number(n) => {
				if let Some(i) = n.as_i64() {
					Value::Int(i)
				} else if let Some(u) = n.as_u64() {
					Value::UInt(u)
				} else {
					Value::Float(n.as_f64().unwrap_or(f64::NAN))
				}
			}
			JsonValue::String(s) => Value::String(s),
			JsonValue::Array(items) => Value::Sequence(items.into_iter().map(Into::into).collect()),
			JsonValue::Object(map) => {
				Value::Mapping(map.into_iter().map(|(k, v)| (k, v.into())).collect())
			}
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::UInt(a), Value::UInt(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Url(a), Value::Url(b)) => a == b,
			(Value::Error(a), Value::Error(b)) => a == b,
			(Value::Sequence(a), Value::Sequence(b)) => a == b,
			(Value::Mapping(a), Value::Mapping(b)) => a == b,
			(Value::Other(a), Value::Other(b)) => Arc::ptr_eq(&a.0, &b.0),
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	#[test]
	fn test_scalars_pass_through() {
		assert_eq!(serialize(&Value::Null), json!(null));
		assert_eq!(serialize(&true.into()), json!(true));
		assert_eq!(serialize(&(-7i64).into()), json!(-7));
		assert_eq!(serialize(&1.5f64.into()), json!(1.5));
		assert_eq!(serialize(&"hi".into()), json!("hi"));
	}

	#[test]
	fn test_error_without_user_info_has_empty_object() {
		let value: Value = ErrorValue::new("foo", -42).into();
		assert_eq!(
			serialize(&value),
			json!({"domain": "foo", "code": -42, "user_info": {}})
		);
	}

	#[test]
	fn test_nested_error_url_and_sequence() {
		let url = Url::parse("https://example.com/path").unwrap();
		let error = ErrorValue::new("testDomain", 123)
			.with_info("description", "I am error")
			.with_info("underlying_error", ErrorValue::new("foo", -42))
			.with_info(
				"some key",
				Value::Sequence(vec![Value::Url(url), Value::Int(10)]),
			);

		assert_eq!(
			serialize(&error.into()),
			json!({
				"domain": "testDomain",
				"code": 123,
				"user_info": {
					"description": "I am error",
					"underlying_error": {"domain": "foo", "code": -42, "user_info": {}},
					"some key": ["https://example.com/path", 10]
				}
			})
		);
	}

	#[test]
	fn test_other_falls_back_to_debug_string() {
		#[derive(Debug)]
		struct Widget {
			id: u32,
		}

		let value = Value::other(Widget { id: 3 });
		assert_eq!(serialize(&value), json!("Widget { id: 3 }"));
		assert!(matches!(
			to_json(&value),
			Err(SerializationError::Unsupported(_))
		));
	}

	#[test]
	fn test_non_finite_float_falls_back_to_string() {
		assert_eq!(serialize(&Value::Float(f64::NAN)), json!("NaN"));
		assert_eq!(serialize(&Value::Float(f64::INFINITY)), json!("inf"));
		assert!(matches!(
			to_json(&Value::Float(f64::NEG_INFINITY)),
			Err(SerializationError::NonFinite(_))
		));
	}

	fn nested(levels: usize) -> Value {
		let mut value = Value::String("leaf".to_string());
		for _ in 0..levels {
			value = Value::Sequence(vec![value]);
		}
		value
	}

	#[test]
	fn test_depth_cap_substitutes_sentinel() {
		let mut json = serialize(&nested(MAX_DEPTH + 8));
		let mut arrays = 0;
		loop {
			match json {
				JsonValue::Array(mut items) => {
					json = items.remove(0);
					arrays += 1;
				}
				leaf => {
					assert_eq!(leaf, json!(MAX_DEPTH_SENTINEL));
					break;
				}
			}
		}
		assert_eq!(arrays, MAX_DEPTH + 1);

		assert!(matches!(
			to_json(&nested(MAX_DEPTH + 1)),
			Err(SerializationError::TooDeep { .. })
		));
		assert!(to_json(&nested(MAX_DEPTH)).is_ok());
	}

	#[test]
	fn test_from_error_walks_source_chain() {
		#[derive(Debug)]
		struct Outer(std::io::Error);

		impl fmt::Display for Outer {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "outer failed")
			}
		}

		impl StdError for Outer {
			fn source(&self) -> Option<&(dyn StdError + 'static)> {
				Some(&self.0)
			}
		}

		let error = Outer(std::io::Error::from_raw_os_error(2));
		let value = ErrorValue::from_error(&error);

		assert!(value.domain.ends_with("Outer"));
		assert_eq!(value.code, 0);
		let info = value.user_info.as_ref().unwrap();
		assert_eq!(info.get("description"), Some(&Value::from("outer failed")));
		match info.get("underlying_error") {
			Some(Value::Error(inner)) => {
				assert_eq!(inner.domain, "Os");
				assert_eq!(inner.code, 2);
			}
			other => panic!("expected underlying error, got {other:?}"),
		}
	}

	#[test]
	fn test_json_round_trips_through_value() {
		let json = json!({"a": [1, "two", null, {"b": false}], "c": 2.5});
		assert_eq!(serialize(&Value::from(json.clone())), json);
	}

	proptest! {
		#[test]
		fn serialize_preserves_sequence_order(
			items in proptest::collection::vec(any::<i64>(), 0..32),
		) {
			let value = Value::Sequence(items.iter().copied().map(Value::Int).collect());
			let expected: Vec<JsonValue> = items.iter().map(|i| json!(i)).collect();
			prop_assert_eq!(serialize(&value), JsonValue::Array(expected));
		}

		#[test]
		fn strict_and_lenient_agree_on_finite_floats(f in proptest::num::f64::NORMAL) {
			let value = Value::Float(f);
			prop_assert_eq!(to_json(&value).unwrap(), serialize(&value));
		}
	}
}
