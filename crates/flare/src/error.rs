// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the Flare SDK.

use flare_core::CoreError;
use thiserror::Error;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, FlareError>;

/// Errors that can occur in the SDK.
///
/// Capture calls never return these; a failed send is persisted and reported
/// through the completion callback.
#[derive(Debug, Error)]
pub enum FlareError {
	/// The DSN could not be parsed.
	#[error("invalid DSN: {0}")]
	InvalidDsn(String),

	/// No DSN was configured.
	#[error("a DSN is required")]
	MissingDsn,

	/// A configuration value could not be parsed.
	#[error("invalid value for {key}: {message}")]
	InvalidConfig {
		/// Setting or environment variable name.
		key: String,
		/// What was wrong with it.
		message: String,
	},

	/// No tokio runtime was provided or running.
	#[error("no tokio runtime available to deliver events")]
	NoRuntime,

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned a non-success status.
	#[error("server error (status {status}): {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Response body.
		message: String,
	},

	/// A transport rejected the event for another reason.
	#[error("send failed: {0}")]
	SendFailed(String),

	/// A persisted event could not be found.
	#[error("persisted event not found: {0}")]
	NotFound(String),

	/// Storage I/O failed.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// Event model error.
	#[error(transparent)]
	Core(#[from] CoreError),

	/// Failed to serialize JSON.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}
