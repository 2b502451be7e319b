// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Data Source Name: where and with which credentials events are sent.
//!
//! Format: `{scheme}://{public_key}[:{secret_key}]@{host}[:{port}]/[{path}/]{project_id}`

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::CoreError;

/// A parsed DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
	scheme: String,
	public_key: String,
	secret_key: Option<String>,
	host: String,
	port: Option<u16>,
	path: String,
	project_id: String,
}

impl Dsn {
	pub fn scheme(&self) -> &str {
		&self.scheme
	}

	pub fn public_key(&self) -> &str {
		&self.public_key
	}

	pub fn secret_key(&self) -> Option<&str> {
		self.secret_key.as_deref()
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn port(&self) -> Option<u16> {
		self.port
	}

	/// Path prefix in front of the project id, empty or starting with `/`.
	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn project_id(&self) -> &str {
		&self.project_id
	}

	/// Endpoint events are posted to.
	pub fn store_url(&self) -> String {
		format!(
			"{}/api/{}/store/",
			self.origin_with_path(),
			self.project_id
		)
	}

	fn origin_with_path(&self) -> String {
		match self.port {
			Some(port) => format!("{}://{}:{}{}", self.scheme, self.host, port, self.path),
			None => format!("{}://{}{}", self.scheme, self.host, self.path),
		}
	}
}

impl FromStr for Dsn {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let url = Url::parse(s.trim()).map_err(|e| CoreError::InvalidDsn(e.to_string()))?;

		let scheme = url.scheme();
		if scheme != "http" && scheme != "https" {
			return Err(CoreError::InvalidDsn(format!("unsupported scheme {scheme:?}")));
		}

		let public_key = url.username();
		if public_key.is_empty() {
			return Err(CoreError::InvalidDsn("missing public key".to_string()));
		}

		let host = url
			.host_str()
			.ok_or_else(|| CoreError::InvalidDsn("missing host".to_string()))?;

		let mut segments: Vec<&str> = url
			.path_segments()
			.map(|segments| segments.filter(|s| !s.is_empty()).collect())
			.unwrap_or_default();
		let project_id = segments
			.pop()
			.ok_or_else(|| CoreError::InvalidDsn("missing project id".to_string()))?;
		let path = segments
			.iter()
			.map(|segment| format!("/{segment}"))
			.collect::<String>();

		Ok(Self {
			scheme: scheme.to_string(),
			public_key: public_key.to_string(),
			secret_key: url.password().map(str::to_string),
			host: host.to_string(),
			port: url.port(),
			path,
			project_id: project_id.to_string(),
		})
	}
}

impl fmt::Display for Dsn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}://{}", self.scheme, self.public_key)?;
		if let Some(secret) = &self.secret_key {
			write!(f, ":{secret}")?;
		}
		write!(f, "@{}", self.host)?;
		if let Some(port) = self.port {
			write!(f, ":{port}")?;
		}
		write!(f, "{}/{}", self.path, self.project_id)
	}
}
