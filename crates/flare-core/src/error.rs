// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the core event model.

use thiserror::Error;

/// Errors that can occur while building or mutating events.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("invalid DSN: {0}")]
	InvalidDsn(String),

	#[error("invalid level: {0}")]
	InvalidLevel(String),

	#[error("invalid breadcrumb level: {0}")]
	InvalidBreadcrumbLevel(String),

	#[error("value is not JSON-serializable: {0}")]
	NotSerializable(#[from] SerializationError),

	#[error("tag {key:?} must be a JSON scalar")]
	TagNotScalar { key: String },

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Why a value could not be converted to JSON without substitution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializationError {
	#[error("non-finite number {0}")]
	NonFinite(f64),

	#[error("unsupported value {0}")]
	Unsupported(String),

	#[error("nesting deeper than {max} levels")]
	TooDeep { max: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
