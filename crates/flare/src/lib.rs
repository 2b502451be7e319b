// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flare error-reporting SDK.
//!
//! Captures errors and messages as events, enriches them with client-wide
//! context (user, release, tags, extra, breadcrumbs) and delivers them
//! asynchronously. Events that fail to send are persisted and resent when the
//! next client starts.
//!
//! # Example
//!
//! ```ignore
//! use flare::{source_location, Breadcrumb, Client, Level, PanicReporter, FileStorage};
//! use std::sync::Arc;
//!
//! let client = Client::builder()
//!     .dsn("https://public@errors.example.com/42")
//!     .release(env!("CARGO_PKG_VERSION"))
//!     .build()?;
//!
//! client.set_crash_handler(Arc::new(PanicReporter::new(FileStorage::from_cache_dir()?)));
//! client.record_breadcrumb(Breadcrumb::new("http", "GET /api/users"));
//!
//! if let Err(e) = do_something() {
//!     client.capture_error(&e, source_location!());
//! }
//! ```

mod breadcrumbs;
mod client;
mod config;
mod crash_handler;
mod error;
mod merge;
mod panic_hook;
mod pipeline;
mod storage;
mod transport;

pub use breadcrumbs::{BreadcrumbObserver, BreadcrumbStore, DEFAULT_MAX_BREADCRUMBS};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, ENV_CACHE_DIR, ENV_DSN, ENV_MAX_BREADCRUMBS, ENV_RELEASE};
pub use crash_handler::CrashHandler;
pub use error::{FlareError, Result};
pub use merge::{
	apply, apply_context, attach_breadcrumbs, resolve_release, resolve_user, ClientContext,
};
pub use panic_hook::PanicReporter;
pub use pipeline::{CaptureHandle, Completion, DeliveryPipeline, DrainReport};
pub use storage::{FileStorage, MemoryStorage, PersistedEvent, Storage};
pub use transport::{HttpTransport, Transport, DEFAULT_REQUEST_TIMEOUT, PROTOCOL_VERSION};

pub use flare_core::{
	build_from_error, build_from_message, serialize, serialize_map, source_location, to_json,
	Breadcrumb, BreadcrumbLevel, CoreError, Dsn, ErrorValue, Event, EventId, Exception, Extra,
	Frame, Level, SerializationError, SourceLocation, Stacktrace, Tags, User, Value,
	USER_INFO_KEY,
};
