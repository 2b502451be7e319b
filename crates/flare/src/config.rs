// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration and environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::breadcrumbs::DEFAULT_MAX_BREADCRUMBS;
use crate::error::{FlareError, Result};
use crate::transport::DEFAULT_REQUEST_TIMEOUT;

pub const ENV_DSN: &str = "FLARE_DSN";
pub const ENV_RELEASE: &str = "FLARE_RELEASE";
pub const ENV_CACHE_DIR: &str = "FLARE_CACHE_DIR";
pub const ENV_MAX_BREADCRUMBS: &str = "FLARE_MAX_BREADCRUMBS";

/// Settings for the client that are not collaborators.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	/// Maximum breadcrumbs to keep.
	pub max_breadcrumbs: usize,
	/// Timeout for a single HTTP send.
	pub request_timeout: Duration,
	/// Base directory for persisted events. `None` uses the platform cache dir.
	pub cache_dir: Option<PathBuf>,
	/// Resend persisted events when the client is built.
	pub drain_on_startup: bool,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			cache_dir: None,
			drain_on_startup: true,
		}
	}
}

/// Values read from `FLARE_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct EnvOverrides {
	pub dsn: Option<String>,
	pub release: Option<String>,
	pub cache_dir: Option<PathBuf>,
	pub max_breadcrumbs: Option<usize>,
}

impl EnvOverrides {
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads overrides through `lookup`. Empty values count as unset.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

		let max_breadcrumbs = match var(ENV_MAX_BREADCRUMBS) {
			Some(v) => Some(v.trim().parse().map_err(|_| FlareError::InvalidConfig {
				key: ENV_MAX_BREADCRUMBS.to_string(),
				message: format!("invalid breadcrumb count '{v}'"),
			})?),
			None => None,
		};

		let overrides = Self {
			dsn: var(ENV_DSN),
			release: var(ENV_RELEASE),
			cache_dir: var(ENV_CACHE_DIR).map(PathBuf::from),
			max_breadcrumbs,
		};
		debug!(
			has_dsn = overrides.dsn.is_some(),
			has_release = overrides.release.is_some(),
			"loaded environment overrides"
		);
		Ok(overrides)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name: &str| vars.get(name).cloned()
	}

	#[test]
	fn test_config_defaults() {
		let config = ClientConfig::default();
		assert_eq!(config.max_breadcrumbs, 20);
		assert_eq!(config.request_timeout, Duration::from_secs(30));
		assert!(config.cache_dir.is_none());
		assert!(config.drain_on_startup);
	}

	#[test]
	fn test_reads_all_variables() {
		let overrides = EnvOverrides::from_lookup(lookup(&[
			(ENV_DSN, "https://key@example.com/1"),
			(ENV_RELEASE, "1.2.3"),
			(ENV_CACHE_DIR, "/tmp/flare"),
			(ENV_MAX_BREADCRUMBS, "50"),
		]))
		.unwrap();

		assert_eq!(overrides.dsn.as_deref(), Some("https://key@example.com/1"));
		assert_eq!(overrides.release.as_deref(), Some("1.2.3"));
		assert_eq!(overrides.cache_dir, Some(PathBuf::from("/tmp/flare")));
		assert_eq!(overrides.max_breadcrumbs, Some(50));
	}

	#[test]
	fn test_empty_values_are_unset() {
		let overrides =
			EnvOverrides::from_lookup(lookup(&[(ENV_DSN, ""), (ENV_MAX_BREADCRUMBS, "")])).unwrap();
		assert_eq!(overrides, EnvOverrides::default());
	}

	#[test]
	fn test_invalid_breadcrumb_count_is_rejected() {
		let result = EnvOverrides::from_lookup(lookup(&[(ENV_MAX_BREADCRUMBS, "lots")]));
		assert!(matches!(
			result,
			Err(FlareError::InvalidConfig { ref key, .. }) if key == ENV_MAX_BREADCRUMBS
		));
	}
}
