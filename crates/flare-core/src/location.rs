// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Source location of a capture call.

use std::path::Path;

use crate::event::{Frame, Stacktrace};

/// File, line and function a capture originated from.
///
/// The file name, culprit and single-frame stacktrace are derived once at
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
	file: String,
	line: u32,
	function: String,
	file_name: String,
	culprit: String,
	stacktrace: Stacktrace,
}

impl SourceLocation {
	pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
		let file = file.into();
		let function = function.into();

		let file_name = Path::new(&file)
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| file.clone());
		let culprit = format!("{file_name}:{line} {function}");
		let stacktrace = Stacktrace {
			frames: vec![Frame {
				filename: file_name.clone(),
				function: function.clone(),
				lineno: line,
			}],
		};

		Self {
			file,
			line,
			function,
			file_name,
			culprit,
			stacktrace,
		}
	}

	pub fn file(&self) -> &str {
		&self.file
	}

	pub fn line(&self) -> u32 {
		self.line
	}

	pub fn function(&self) -> &str {
		&self.function
	}

	/// Last path component of the file.
	pub fn file_name(&self) -> &str {
		&self.file_name
	}

	/// `"{file_name}:{line} {function}"`
	pub fn culprit(&self) -> &str {
		&self.culprit
	}

	pub fn stacktrace(&self) -> &Stacktrace {
		&self.stacktrace
	}
}

/// Captures the [`SourceLocation`] of the macro call site, including the
/// path of the enclosing function.
#[macro_export]
macro_rules! source_location {
	() => {{
		fn __flare_here() {}
		fn __flare_type_name_of<T>(_: T) -> &'static str {
			::std::any::type_name::<T>()
		}
		let name = __flare_type_name_of(__flare_here);
		let function = name.strip_suffix("::__flare_here").unwrap_or(name);
		$crate::SourceLocation::new(file!(), line!(), function)
	}};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_derived_fields() {
		let location = SourceLocation::new("/src/app/handlers.rs", 42, "handle_request");
		assert_eq!(location.file_name(), "handlers.rs");
		assert_eq!(location.culprit(), "handlers.rs:42 handle_request");
		assert_eq!(
			location.stacktrace().frames,
			vec![Frame {
				filename: "handlers.rs".to_string(),
				function: "handle_request".to_string(),
				lineno: 42,
			}]
		);
	}

	#[test]
	fn test_bare_file_name() {
		let location = SourceLocation::new("a", 1, "b");
		assert_eq!(location.file_name(), "a");
		assert_eq!(location.culprit(), "a:1 b");
	}

	#[test]
	fn test_macro_names_enclosing_function() {
		let location = crate::source_location!();
		assert_eq!(location.file_name(), "location.rs");
		assert!(location
			.function()
			.ends_with("tests::test_macro_names_enclosing_function"));
	}
}
