// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The Flare client: capture entry points and client-wide context.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use flare_core::{
	build_from_error, build_from_message, Breadcrumb, Dsn, ErrorValue, Event, Level,
	SourceLocation, User, Value,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::breadcrumbs::BreadcrumbStore;
use crate::config::{ClientConfig, EnvOverrides};
use crate::crash_handler::{with_handler, CrashHandler, CrashHandlerSlot};
use crate::error::{FlareError, Result};
use crate::merge::{self, ClientContext};
use crate::pipeline::{CaptureHandle, Completion, DeliveryPipeline, DrainReport};
use crate::storage::{FileStorage, MemoryStorage, Storage};
use crate::transport::{HttpTransport, Transport};

/// Builder for constructing a [`Client`].
pub struct ClientBuilder {
	dsn: Option<String>,
	release: Option<String>,
	config: ClientConfig,
	transport: Option<Arc<dyn Transport>>,
	storage: Option<Arc<dyn Storage>>,
	runtime: Option<Handle>,
}

impl ClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			dsn: None,
			release: None,
			config: ClientConfig::default(),
			transport: None,
			storage: None,
			runtime: None,
		}
	}

	/// Creates a builder from `FLARE_DSN`, `FLARE_RELEASE`, `FLARE_CACHE_DIR`
	/// and `FLARE_MAX_BREADCRUMBS`.
	pub fn from_env() -> Result<Self> {
		Ok(Self::new().with_overrides(EnvOverrides::from_env()?))
	}

	pub(crate) fn with_overrides(mut self, overrides: EnvOverrides) -> Self {
		if let Some(dsn) = overrides.dsn {
			self.dsn = Some(dsn);
		}
		if let Some(release) = overrides.release {
			self.release = Some(release);
		}
		if let Some(dir) = overrides.cache_dir {
			self.config.cache_dir = Some(dir);
		}
		if let Some(max) = overrides.max_breadcrumbs {
			self.config.max_breadcrumbs = max;
		}
		self
	}

	/// Sets the DSN, e.g. `https://public@errors.example.com/42`.
	pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
		self.dsn = Some(dsn.into());
		self
	}

	/// Sets the client-wide release version.
	pub fn release(mut self, release: impl Into<String>) -> Self {
		self.release = Some(release.into());
		self
	}

	/// Sets the maximum number of breadcrumbs to keep.
	pub fn max_breadcrumbs(mut self, max: usize) -> Self {
		self.config.max_breadcrumbs = max;
		self
	}

	/// Sets the HTTP request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;
		self
	}

	/// Persists undelivered events under `<dir>/flare/events`.
	pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.config.cache_dir = Some(dir.into());
		self
	}

	/// Replaces the HTTP transport.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Replaces the file storage.
	pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
		self.storage = Some(storage);
		self
	}

	/// Runtime that sends run on. Defaults to the current runtime.
	pub fn runtime(mut self, runtime: Handle) -> Self {
		self.runtime = Some(runtime);
		self
	}

	/// Whether persisted events are resent when the client is built.
	pub fn drain_on_startup(mut self, enabled: bool) -> Self {
		self.config.drain_on_startup = enabled;
		self
	}

	pub(crate) fn has_dsn(&self) -> bool {
		self.dsn.as_deref().is_some_and(|dsn| !dsn.trim().is_empty())
	}

	/// Builds the client and, unless disabled, starts resending persisted
	/// events in the background.
	pub fn build(self) -> Result<Client> {
		let raw_dsn = self.dsn.ok_or(FlareError::MissingDsn)?;
		let dsn: Dsn = raw_dsn.trim().parse().map_err(|e| {
			error!(error = %e, "invalid DSN, client not created");
			FlareError::InvalidDsn(raw_dsn.clone())
		})?;

		let runtime = match self.runtime {
			Some(runtime) => runtime,
			None => Handle::try_current().map_err(|_| FlareError::NoRuntime)?,
		};

		let transport: Arc<dyn Transport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::new(&dsn, self.config.request_timeout)?),
		};
		let storage = match self.storage {
			Some(storage) => storage,
			None => default_storage(&self.config),
		};

		let crash_handler: CrashHandlerSlot = Arc::new(RwLock::new(None));
		let breadcrumbs = BreadcrumbStore::new(self.config.max_breadcrumbs);
		let slot = Arc::clone(&crash_handler);
		breadcrumbs.set_observer(Arc::new(move |snapshot| {
			with_handler(&slot, |handler| handler.set_breadcrumbs(snapshot));
		}));

		let pipeline = DeliveryPipeline::new(transport, storage, runtime);
		let startup_drain = self.config.drain_on_startup.then(|| pipeline.spawn_drain());

		info!(store_url = %dsn.store_url(), "Flare client initialized");

		let inner = Arc::new(ClientInner {
			dsn,
			config: self.config,
			context: RwLock::new(ClientContext {
				release: self.release,
				..Default::default()
			}),
			breadcrumbs,
			crash_handler,
			pipeline,
			startup_drain: Mutex::new(startup_drain),
			closed: AtomicBool::new(false),
		});

		Ok(Client { inner })
	}
}

impl Default for ClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn default_storage(config: &ClientConfig) -> Arc<dyn Storage> {
	if let Some(dir) = &config.cache_dir {
		return Arc::new(FileStorage::in_dir(dir));
	}
	match FileStorage::from_cache_dir() {
		Ok(storage) => Arc::new(storage),
		Err(e) => {
			warn!(error = %e, "no cache directory, undelivered events are kept in memory");
			Arc::new(MemoryStorage::new())
		}
	}
}

/// Internal client state.
struct ClientInner {
	dsn: Dsn,
	config: ClientConfig,
	context: RwLock<ClientContext>,
	breadcrumbs: BreadcrumbStore,
	crash_handler: CrashHandlerSlot,
	pipeline: DeliveryPipeline,
	startup_drain: Mutex<Option<JoinHandle<DrainReport>>>,
	closed: AtomicBool,
}

/// Client for capturing events and reporting them.
///
/// Cheap to clone; clones share state. Capture methods never block on the
/// network and never fail: a send that fails is persisted and resent the
/// next time a client starts.
///
/// Lock order is context, then breadcrumbs, then the crash handler slot.
///
/// # Example
///
/// ```ignore
/// use flare::{source_location, Client, Level};
///
/// let Some(client) = Client::from_dsn(&std::env::var("FLARE_DSN").unwrap_or_default())? else {
///     return Ok(());
/// };
/// client.set_tag("region", "eu-west-1")?;
/// client.capture_message("cache warmed", Level::Info);
///
/// if let Err(e) = std::fs::read("config.toml") {
///     client.capture_error(&e, source_location!());
/// }
/// ```
#[derive(Clone)]
pub struct Client {
	inner: Arc<ClientInner>,
}

impl Client {
	/// Creates a new builder for constructing a Client.
	pub fn builder() -> ClientBuilder {
		ClientBuilder::new()
	}

	/// Builds a client for `dsn` with default settings.
	///
	/// An empty DSN disables reporting and yields `Ok(None)`. A malformed DSN
	/// is logged and returned as [`FlareError::InvalidDsn`].
	pub fn from_dsn(dsn: &str) -> Result<Option<Client>> {
		if dsn.trim().is_empty() {
			debug!("empty DSN, reporting disabled");
			return Ok(None);
		}
		ClientBuilder::new().dsn(dsn).build().map(Some)
	}

	/// Builds a client from `FLARE_*` environment variables, or `Ok(None)` if
	/// `FLARE_DSN` is unset or empty.
	pub fn from_env() -> Result<Option<Client>> {
		let builder = ClientBuilder::from_env()?;
		if !builder.has_dsn() {
			debug!("FLARE_DSN not set, reporting disabled");
			return Ok(None);
		}
		builder.build().map(Some)
	}

	pub fn dsn(&self) -> &Dsn {
		&self.inner.dsn
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Captures a message at `level`.
	pub fn capture_message(&self, message: impl Into<String>, level: Level) -> CaptureHandle {
		self.capture_event(build_from_message(message, level))
	}

	/// Captures a Rust error at error level.
	pub fn capture_error<E>(&self, error: &E, location: SourceLocation) -> CaptureHandle
	where
		E: std::error::Error + 'static,
	{
		self.capture_error_value(&ErrorValue::from_error(error), location)
	}

	/// Captures an error described by domain, code and details.
	pub fn capture_error_value(
		&self,
		error: &ErrorValue,
		location: SourceLocation,
	) -> CaptureHandle {
		self.capture_event(build_from_error(error, &location))
	}

	/// Captures a prebuilt event with client context applied.
	pub fn capture_event(&self, event: Event) -> CaptureHandle {
		self.capture_event_with(event, true, None)
	}

	/// Captures a prebuilt event.
	///
	/// With `use_client_context` false the client's user, release, tags and
	/// extra are not applied; an error-level event still takes the
	/// breadcrumbs. `completed` is called once with the delivery outcome.
	pub fn capture_event_with(
		&self,
		mut event: Event,
		use_client_context: bool,
		completed: Option<Completion>,
	) -> CaptureHandle {
		if self.is_closed() {
			debug!(event_id = %event.event_id, "client is shut down, dropping event");
			if let Some(completed) = completed {
				completed(false);
			}
			return CaptureHandle::ready(false);
		}

		if use_client_context {
			let context = self.read_context();
			merge::apply(&mut event, &context, &self.inner.breadcrumbs);
		} else {
			merge::attach_breadcrumbs(&mut event, &self.inner.breadcrumbs);
		}

		debug!(event_id = %event.event_id, level = %event.level, "capturing event");
		self.inner.pipeline.dispatch(event, completed)
	}

	/// Adds a breadcrumb to the trail.
	pub fn record_breadcrumb(&self, breadcrumb: Breadcrumb) {
		self.inner.breadcrumbs.record(breadcrumb);
	}

	/// Clears all breadcrumbs.
	pub fn clear_breadcrumbs(&self) {
		self.inner.breadcrumbs.clear();
	}

	/// Current breadcrumbs, oldest first.
	pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
		self.inner.breadcrumbs.snapshot()
	}

	/// Sets the client-wide user.
	pub fn set_user(&self, user: User) {
		let mut context = self.write_context();
		context.user = Some(Arc::new(user));
		let user = context.user.clone();
		with_handler(&self.inner.crash_handler, |handler| handler.set_user(user));
	}

	/// Clears the client-wide user.
	pub fn clear_user(&self) {
		let mut context = self.write_context();
		context.user = None;
		with_handler(&self.inner.crash_handler, |handler| handler.set_user(None));
	}

	pub fn user(&self) -> Option<Arc<User>> {
		self.read_context().user.clone()
	}

	/// Sets or clears the client-wide release.
	pub fn set_release(&self, release: Option<String>) {
		let mut context = self.write_context();
		context.release = release;
		with_handler(&self.inner.crash_handler, |handler| {
			handler.set_release(context.release.as_deref())
		});
	}

	pub fn release(&self) -> Option<String> {
		self.read_context().release.clone()
	}

	/// Sets a client-wide tag. Tags must be JSON scalars.
	///
	/// Fails with [`flare_core::CoreError::TagNotScalar`] for arrays and
	/// objects; the tags are left unchanged.
	pub fn set_tag(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
		let key = key.into();
		let value = value.into();
		if !value.is_scalar() {
			return Err(flare_core::CoreError::TagNotScalar { key }.into());
		}
		self.update_tags(|tags| {
			tags.insert(key, value);
		});
		Ok(())
	}

	/// Removes a client-wide tag.
	pub fn remove_tag(&self, key: &str) {
		self.update_tags(|tags| {
			tags.remove(key);
		});
	}

	/// Replaces all client-wide tags.
	///
	/// Values are not checked here; a map that does not convert to JSON
	/// scalars is skipped at merge time.
	pub fn set_tags(&self, tags: BTreeMap<String, Value>) {
		self.update_tags(|current| *current = tags);
	}

	pub fn tags(&self) -> BTreeMap<String, Value> {
		self.read_context().tags.clone()
	}

	/// Sets a client-wide extra value.
	pub fn set_extra(&self, key: impl Into<String>, value: impl Into<Value>) {
		let key = key.into();
		let value = value.into();
		self.update_extra(|extra| {
			extra.insert(key, value);
		});
	}

	/// Removes a client-wide extra value.
	pub fn remove_extra(&self, key: &str) {
		self.update_extra(|extra| {
			extra.remove(key);
		});
	}

	/// Replaces all client-wide extra values.
	pub fn set_extras(&self, extra: BTreeMap<String, Value>) {
		self.update_extra(|current| *current = extra);
	}

	pub fn extra(&self) -> BTreeMap<String, Value> {
		self.read_context().extra.clone()
	}

	/// Installs a crash handler, calls its `start` and pushes the full current
	/// context to it. Replaces any previous handler.
	pub fn set_crash_handler(&self, handler: Arc<dyn CrashHandler>) {
		{
			let mut slot = self
				.inner
				.crash_handler
				.write()
				.unwrap_or_else(|poisoned| poisoned.into_inner());
			*slot = Some(Arc::clone(&handler));
		}

		handler.start();

		let context = self.read_context();
		handler.set_user(context.user.clone());
		handler.set_release(context.release.as_deref());
		handler.set_tags(&context.tags);
		handler.set_extra(&context.extra);
		// Pushed under the store lock so a concurrent record cannot be
		// overwritten by an older trail.
		self.inner.breadcrumbs.notify_now();
		info!("Crash handler installed");
	}

	/// Resends persisted events now.
	pub async fn resend_persisted(&self) -> Result<DrainReport> {
		self.inner.pipeline.resend_persisted().await
	}

	/// Waits for the drain started by [`ClientBuilder::build`]. Returns `None`
	/// if no drain was started or it was already awaited.
	pub async fn wait_for_startup_drain(&self) -> Option<DrainReport> {
		let handle = self
			.inner
			.startup_drain
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.take()?;
		match handle.await {
			Ok(report) => Some(report),
			Err(e) => {
				error!(error = %e, "startup drain task failed");
				None
			}
		}
	}

	/// Stops accepting captures. Sends already in flight still complete.
	pub fn shutdown(&self) {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return;
		}
		info!("Flare client shutdown");
	}

	/// Returns true if the client has been shut down.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	fn update_tags(&self, f: impl FnOnce(&mut BTreeMap<String, Value>)) {
		let mut context = self.write_context();
		f(&mut context.tags);
		with_handler(&self.inner.crash_handler, |handler| handler.set_tags(&context.tags));
	}

	fn update_extra(&self, f: impl FnOnce(&mut BTreeMap<String, Value>)) {
		let mut context = self.write_context();
		f(&mut context.extra);
		with_handler(&self.inner.crash_handler, |handler| handler.set_extra(&context.extra));
	}

	fn read_context(&self) -> RwLockReadGuard<'_, ClientContext> {
		self.inner
			.context
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn write_context(&self) -> RwLockWriteGuard<'_, ClientContext> {
		self.inner
			.context
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::storage::MemoryStorage;
	use async_trait::async_trait;

	struct AcceptAll;

	#[async_trait]
	impl Transport for AcceptAll {
		async fn send(&self, _payload: &[u8]) -> Result<()> {
			Ok(())
		}
	}

	fn test_builder() -> ClientBuilder {
		ClientBuilder::new()
			.dsn("https://public@errors.example.com/42")
			.transport(Arc::new(AcceptAll))
			.storage(Arc::new(MemoryStorage::new()))
	}

	#[test]
	fn test_builder_requires_dsn() {
		let result = ClientBuilder::new().build();
		assert!(matches!(result, Err(FlareError::MissingDsn)));
	}

	#[test]
	fn test_builder_rejects_malformed_dsn() {
		let result = ClientBuilder::new().dsn("not a dsn").build();
		assert!(matches!(result, Err(FlareError::InvalidDsn(ref dsn)) if dsn == "not a dsn"));
	}

	#[test]
	fn test_builder_requires_runtime() {
		let result = test_builder().build();
		assert!(matches!(result, Err(FlareError::NoRuntime)));
	}

	#[tokio::test]
	async fn test_builder_success() {
		let client = test_builder()
			.release("1.0.0")
			.max_breadcrumbs(5)
			.build()
			.unwrap();

		assert_eq!(client.dsn().project_id(), "42");
		assert_eq!(client.dsn().public_key(), "public");
		assert_eq!(client.release().as_deref(), Some("1.0.0"));
		assert_eq!(client.config().max_breadcrumbs, 5);
		assert_eq!(client.wait_for_startup_drain().await, Some(DrainReport::default()));
		assert_eq!(client.wait_for_startup_drain().await, None);
	}

	#[test]
	fn test_env_overrides_apply_to_builder() {
		let builder = ClientBuilder::new().with_overrides(EnvOverrides {
			dsn: Some("https://k@example.com/1".to_string()),
			release: Some("9.9.9".to_string()),
			cache_dir: Some(PathBuf::from("/var/cache/app")),
			max_breadcrumbs: Some(7),
		});

		assert!(builder.has_dsn());
		assert_eq!(builder.release.as_deref(), Some("9.9.9"));
		assert_eq!(builder.config.cache_dir, Some(PathBuf::from("/var/cache/app")));
		assert_eq!(builder.config.max_breadcrumbs, 7);
	}

	#[test]
	fn test_blank_dsn_is_not_configured() {
		assert!(!ClientBuilder::new().has_dsn());
		assert!(!ClientBuilder::new().dsn("   ").has_dsn());
	}

	#[tokio::test]
	async fn test_set_and_remove_tag() {
		let client = test_builder().build().unwrap();

		client.set_tag("env", "test").unwrap();
		assert!(client.tags().contains_key("env"));

		client.remove_tag("env");
		assert!(!client.tags().contains_key("env"));
	}

	#[tokio::test]
	async fn test_set_tag_rejects_non_scalar() {
		let client = test_builder().build().unwrap();
		let result = client.set_tag("list", vec![1, 2]);
		assert!(matches!(
			result,
			Err(FlareError::Core(flare_core::CoreError::TagNotScalar { .. }))
		));
		assert!(client.tags().is_empty());
	}

	#[tokio::test]
	async fn test_extra_and_user_setters() {
		let client = test_builder().build().unwrap();

		client.set_extra("attempt", 3);
		client.set_extras(BTreeMap::from([("build".to_string(), Value::from("abc"))]));
		assert_eq!(client.extra().len(), 1);
		client.remove_extra("build");
		assert!(client.extra().is_empty());

		client.set_user(User::with_id("u-1"));
		assert_eq!(client.user().unwrap().id.as_deref(), Some("u-1"));
		client.clear_user();
		assert!(client.user().is_none());
	}

	#[tokio::test]
	async fn test_breadcrumb_limit() {
		let client = test_builder().max_breadcrumbs(5).build().unwrap();

		for i in 0..10 {
			client.record_breadcrumb(Breadcrumb {
				category: format!("test_{i}"),
				..Default::default()
			});
		}

		let breadcrumbs = client.breadcrumbs();
		assert_eq!(breadcrumbs.len(), 5);
		assert_eq!(breadcrumbs[0].category, "test_5");

		client.clear_breadcrumbs();
		assert!(client.breadcrumbs().is_empty());
	}

	#[tokio::test]
	async fn test_double_shutdown_is_ok() {
		let client = test_builder().build().unwrap();
		client.shutdown();
		client.shutdown();
		assert!(client.is_closed());
	}

	#[tokio::test]
	async fn test_capture_message_is_delivered() {
		let client = test_builder().build().unwrap();
		assert!(client.capture_message("hello", Level::Info).wait().await);
	}
}
