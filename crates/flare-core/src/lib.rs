// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Flare error-reporting SDK.
//!
//! This crate holds everything about an event that does not need a client:
//!
//! - [`Event`] and its wire format
//! - [`Value`], the structured context model, and the JSON conversion
//!   ([`serialize`], [`to_json`]) with its depth guard
//! - [`build_from_error`] / [`build_from_message`]
//! - [`SourceLocation`] and the [`source_location!`] macro
//! - [`Breadcrumb`], [`User`], [`Tags`], [`Extra`]
//! - [`Dsn`] parsing

pub mod breadcrumb;
pub mod builder;
pub mod context;
pub mod dsn;
pub mod error;
pub mod event;
pub mod location;
pub mod value;

pub use breadcrumb::{Breadcrumb, BreadcrumbLevel};
pub use builder::{build_from_error, build_from_message, USER_INFO_KEY};
pub use context::{Extra, Tags, User};
pub use dsn::Dsn;
pub use error::{CoreError, Result, SerializationError};
pub use event::{
	Event, EventId, Exception, Frame, Level, Stacktrace, PLATFORM, SDK_NAME, SDK_VERSION,
};
pub use location::SourceLocation;
pub use value::{
	serialize, serialize_map, to_json, ErrorValue, Value, MAX_DEPTH, MAX_DEPTH_SENTINEL,
};
