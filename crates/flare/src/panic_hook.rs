// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Panic hook integration for crash reporting.
//!
//! A panicking process cannot finish an async send, so [`PanicReporter`]
//! writes the crash event to disk instead. The next client to start with the
//! same cache directory resends it.

use std::collections::BTreeMap;
use std::panic::PanicHookInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use flare_core::{Event, Exception, Extra, Level, SourceLocation, Tags, User, Value};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::crash_handler::CrashHandler;
use crate::error::Result;
use crate::storage::{FileStorage, Storage};

const PANIC_EXCEPTION_TYPE: &str = "panic";

/// Crash handler that persists a fatal event when the process panics.
///
/// Install it with [`crate::Client::set_crash_handler`]; the client keeps its
/// mirrored context current and `start` installs the panic hook, chaining to
/// the hook that was installed before it.
#[derive(Clone)]
pub struct PanicReporter {
	inner: Arc<ReporterInner>,
}

struct ReporterInner {
	storage: FileStorage,
	context: Mutex<MirroredContext>,
	installed: AtomicBool,
}

/// Client context as last pushed, already converted for the wire.
#[derive(Debug, Default)]
struct MirroredContext {
	breadcrumbs: Option<JsonValue>,
	tags: Tags,
	extra: Extra,
	user: Option<Arc<User>>,
	release: Option<String>,
}

impl PanicReporter {
	/// Reporter that saves crash events into `storage`.
	pub fn new(storage: FileStorage) -> Self {
		Self {
			inner: Arc::new(ReporterInner {
				storage,
				context: Mutex::new(MirroredContext::default()),
				installed: AtomicBool::new(false),
			}),
		}
	}

	/// Installs the panic hook. Later calls do nothing.
	pub fn install(&self) {
		if self.inner.installed.swap(true, Ordering::SeqCst) {
			return;
		}

		let reporter = self.clone();
		let previous_hook = std::panic::take_hook();
		std::panic::set_hook(Box::new(move |info| {
			reporter.handle_panic(info);
			previous_hook(info);
		}));
		info!("Panic hook installed");
	}

	pub fn is_installed(&self) -> bool {
		self.inner.installed.load(Ordering::SeqCst)
	}

	/// Builds a fatal event from the mirrored context and saves it.
	pub fn report_panic(&self, message: &str, location: Option<&SourceLocation>) -> Result<String> {
		let event = self.build_event(message, location);
		let payload = event.to_payload()?;
		let record_id = self.inner.storage.save_blocking(&payload)?;
		debug!(event_id = %event.event_id, record_id = %record_id, "crash event saved");
		Ok(record_id)
	}

	fn build_event(&self, message: &str, location: Option<&SourceLocation>) -> Event {
		let mut event = Event::new(message, Level::Fatal);
		if let Some(location) = location {
			event.merge_source_location(location);
		}
		event.exceptions = Some(vec![Exception {
			kind: PANIC_EXCEPTION_TYPE.to_string(),
			value: message.to_string(),
		}]);

		let context = self.lock();
		event.tags = context.tags.clone();
		event.extra = context.extra.clone();
		event.user = context.user.clone();
		event.release = context.release.clone();
		event.breadcrumbs = context.breadcrumbs.clone();
		event
	}

	fn handle_panic(&self, info: &PanicHookInfo<'_>) {
		let message = panic_message(info);
		let location = info
			.location()
			.map(|l| SourceLocation::new(l.file(), l.line(), "<panic>"));

		// Best effort: the previous hook still runs if saving fails.
		if let Err(e) = self.report_panic(&message, location.as_ref()) {
			eprintln!("Failed to save crash report: {e}");
		}
	}

	fn lock(&self) -> MutexGuard<'_, MirroredContext> {
		self.inner
			.context
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

impl CrashHandler for PanicReporter {
	fn start(&self) {
		self.install();
	}

	fn set_breadcrumbs(&self, breadcrumbs: &JsonValue) {
		self.lock().breadcrumbs = Some(breadcrumbs.clone());
	}

	fn set_tags(&self, tags: &BTreeMap<String, Value>) {
		let tags = Tags::from_values(tags).unwrap_or_else(|e| {
			debug!(reason = %e, "tags not mirrored for crash reports");
			Tags::new()
		});
		self.lock().tags = tags;
	}

	fn set_extra(&self, extra: &BTreeMap<String, Value>) {
		let extra = Extra::from_values(extra).unwrap_or_else(|e| {
			debug!(reason = %e, "extra not mirrored for crash reports");
			Extra::new()
		});
		self.lock().extra = extra;
	}

	fn set_user(&self, user: Option<Arc<User>>) {
		self.lock().user = user;
	}

	fn set_release(&self, release: Option<&str>) {
		self.lock().release = release.map(str::to_string);
	}
}

/// Extract the panic message from panic info.
fn panic_message(info: &PanicHookInfo<'_>) -> String {
	if let Some(s) = info.payload().downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = info.payload().downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}
