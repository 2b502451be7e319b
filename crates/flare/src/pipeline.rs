// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Asynchronous event delivery with persistence of failed sends.
//!
//! Each captured event is serialized once and sent on the client's runtime.
//! A failed send stores the already-merged payload; the startup drain resends
//! stored payloads one at a time and deletes each on success. Delivery is
//! at-least-once: a record can be sent again if a drain races a new failure.

use std::sync::Arc;

use flare_core::{Event, EventId};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::storage::Storage;
use crate::transport::Transport;

/// Called once with the delivery outcome. `true` means the event was sent.
pub type Completion = Box<dyn FnOnce(bool) + Send + 'static>;

/// Outcome of resending persisted events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
	pub sent: usize,
	pub failed: usize,
}

/// Resolves to the delivery outcome of one capture.
///
/// Dropping the handle does not cancel delivery.
#[derive(Debug)]
pub struct CaptureHandle {
	inner: HandleState,
}

#[derive(Debug)]
enum HandleState {
	Ready(bool),
	Pending(JoinHandle<bool>),
}

impl CaptureHandle {
	pub(crate) fn ready(delivered: bool) -> Self {
		Self {
			inner: HandleState::Ready(delivered),
		}
	}

	fn pending(handle: JoinHandle<bool>) -> Self {
		Self {
			inner: HandleState::Pending(handle),
		}
	}

	/// Waits for the send to finish. A panicked or cancelled send counts as
	/// not delivered.
	pub async fn wait(self) -> bool {
		match self.inner {
			HandleState::Ready(delivered) => delivered,
			HandleState::Pending(handle) => match handle.await {
				Ok(delivered) => delivered,
				Err(e) => {
					error!(error = %e, "delivery task failed");
					false
				}
			},
		}
	}
}

/// One in-flight send. If the task is dropped before it records an outcome
/// (the runtime shut down first), the payload is saved synchronously and the
/// completion reports `false`.
struct Delivery {
	event_id: EventId,
	payload: Vec<u8>,
	storage: Arc<dyn Storage>,
	completed: Option<Completion>,
	finished: bool,
}

impl Delivery {
	fn finish(mut self, delivered: bool) -> bool {
		self.finished = true;
		if let Some(completed) = self.completed.take() {
			completed(delivered);
		}
		delivered
	}
}

impl Drop for Delivery {
	fn drop(&mut self) {
		if self.finished {
			return;
		}

		warn!(event_id = %self.event_id, "delivery task dropped before sending, persisting event");
		match self.storage.save_blocking(&self.payload) {
			Ok(record_id) => {
				debug!(event_id = %self.event_id, record_id = %record_id, "event persisted");
			}
			Err(e) => {
				error!(
					event_id = %self.event_id,
					error = %e,
					"failed to persist event, event lost"
				);
			}
		}
		if let Some(completed) = self.completed.take() {
			completed(false);
		}
	}
}

/// Sends events and persists the ones that could not be sent.
#[derive(Clone)]
pub struct DeliveryPipeline {
	transport: Arc<dyn Transport>,
	storage: Arc<dyn Storage>,
	runtime: Handle,
}

impl DeliveryPipeline {
	pub fn new(transport: Arc<dyn Transport>, storage: Arc<dyn Storage>, runtime: Handle) -> Self {
		Self {
			transport,
			storage,
			runtime,
		}
	}

	/// Serializes `event` and spawns its delivery. Never blocks on the network.
	///
	/// `completed` runs after the event has been delivered or persisted.
	pub fn dispatch(&self, event: Event, completed: Option<Completion>) -> CaptureHandle {
		let event_id = event.event_id;
		let payload = match event.to_payload() {
			Ok(payload) => payload,
			Err(e) => {
				error!(event_id = %event_id, error = %e, "failed to serialize event, dropping it");
				if let Some(completed) = completed {
					completed(false);
				}
				return CaptureHandle::ready(false);
			}
		};

		let delivery = Delivery {
			event_id,
			payload,
			storage: Arc::clone(&self.storage),
			completed,
			finished: false,
		};
		let pipeline = self.clone();
		let handle = self.runtime.spawn(async move {
			let delivered = pipeline.deliver(delivery.event_id, &delivery.payload).await;
			delivery.finish(delivered)
		});
		CaptureHandle::pending(handle)
	}

	async fn deliver(&self, event_id: EventId, payload: &[u8]) -> bool {
		match self.transport.send(payload).await {
			Ok(()) => {
				debug!(event_id = %event_id, "event delivered");
				true
			}
			Err(e) => {
				warn!(
					event_id = %event_id,
					error = %e,
					"failed to send event, persisting for retry"
				);
				match self.storage.save(payload).await {
					Ok(record_id) => {
						debug!(event_id = %event_id, record_id = %record_id, "event persisted");
					}
					Err(e) => {
						error!(
							event_id = %event_id,
							error = %e,
							"failed to persist event, event lost"
						);
					}
				}
				false
			}
		}
	}

	/// Resends every persisted event, one at a time, deleting each one that
	/// is accepted. Failed records stay for the next drain.
	pub async fn resend_persisted(&self) -> Result<DrainReport> {
		let saved = self.storage.list_saved().await?;
		let mut report = DrainReport::default();

		for record in saved {
			match self.transport.send(&record.data).await {
				Ok(()) => {
					report.sent += 1;
					if let Err(e) = self.storage.delete(&record.id).await {
						warn!(record_id = %record.id, error = %e, "failed to delete resent event");
					}
				}
				Err(e) => {
					report.failed += 1;
					debug!(record_id = %record.id, error = %e, "resend failed, keeping event");
				}
			}
		}

		info!(sent = report.sent, failed = report.failed, "resent persisted events");
		Ok(report)
	}

	/// Runs [`Self::resend_persisted`] in the background.
	pub fn spawn_drain(&self) -> JoinHandle<DrainReport> {
		let pipeline = self.clone();
		self.runtime.spawn(async move {
			match pipeline.resend_persisted().await {
				Ok(report) => report,
				Err(e) => {
					warn!(error = %e, "failed to list persisted events");
					DrainReport::default()
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::FlareError;
	use crate::storage::MemoryStorage;
	use async_trait::async_trait;
	use flare_core::Level;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	use std::sync::Mutex;

	struct MockTransport {
		should_fail: AtomicBool,
		sent: Mutex<Vec<Vec<u8>>>,
		attempts: AtomicUsize,
	}

	impl MockTransport {
		fn new(should_fail: bool) -> Self {
			Self {
				should_fail: AtomicBool::new(should_fail),
				sent: Mutex::new(Vec::new()),
				attempts: AtomicUsize::new(0),
			}
		}
	}

	#[async_trait]
	impl Transport for MockTransport {
		async fn send(&self, payload: &[u8]) -> Result<()> {
			self.attempts.fetch_add(1, Ordering::SeqCst);
			if self.should_fail.load(Ordering::SeqCst) {
				return Err(FlareError::SendFailed("mock failure".to_string()));
			}
			self.sent.lock().unwrap().push(payload.to_vec());
			Ok(())
		}
	}

	fn pipeline(
		transport: &Arc<MockTransport>,
		storage: &Arc<MemoryStorage>,
	) -> DeliveryPipeline {
		DeliveryPipeline::new(
			Arc::clone(transport) as Arc<dyn Transport>,
			Arc::clone(storage) as Arc<dyn Storage>,
			Handle::current(),
		)
	}

	#[tokio::test]
	async fn test_successful_send_is_not_persisted() {
		let transport = Arc::new(MockTransport::new(false));
		let storage = Arc::new(MemoryStorage::new());
		let pipeline = pipeline(&transport, &storage);

		let delivered = pipeline
			.dispatch(Event::new("hello", Level::Info), None)
			.wait()
			.await;

		assert!(delivered);
		assert!(storage.is_empty());
		let sent = transport.sent.lock().unwrap();
		let body: serde_json::Value = serde_json::from_slice(&sent[0]).unwrap();
		assert_eq!(body["message"], "hello");
	}

	#[tokio::test]
	async fn test_failed_send_persists_before_completion() {
		let transport = Arc::new(MockTransport::new(true));
		let storage = Arc::new(MemoryStorage::new());
		let pipeline = pipeline(&transport, &storage);

		let observed = Arc::new(Mutex::new(None));
		let sink = Arc::clone(&observed);
		let seen_storage = Arc::clone(&storage);
		let completion: Completion = Box::new(move |delivered| {
			*sink.lock().unwrap() = Some((delivered, seen_storage.len()));
		});

		let delivered = pipeline
			.dispatch(Event::new("boom", Level::Error), Some(completion))
			.wait()
			.await;

		assert!(!delivered);
		assert_eq!(*observed.lock().unwrap(), Some((false, 1)));
	}

	#[tokio::test]
	async fn test_resend_deletes_only_accepted_records() {
		let transport = Arc::new(MockTransport::new(true));
		let storage = Arc::new(MemoryStorage::new());
		let pipeline = pipeline(&transport, &storage);

		pipeline.dispatch(Event::new("a", Level::Error), None).wait().await;
		pipeline.dispatch(Event::new("b", Level::Error), None).wait().await;
		assert_eq!(storage.len(), 2);

		let report = pipeline.resend_persisted().await.unwrap();
		assert_eq!(report, DrainReport { sent: 0, failed: 2 });
		assert_eq!(storage.len(), 2);

		transport.should_fail.store(false, Ordering::SeqCst);
		let report = pipeline.spawn_drain().await.unwrap();
		assert_eq!(report, DrainReport { sent: 2, failed: 0 });
		assert!(storage.is_empty());
		assert_eq!(transport.attempts.load(Ordering::SeqCst), 6);
	}

	#[test]
	fn test_dispatch_after_runtime_shutdown_persists_and_completes() {
		let runtime = tokio::runtime::Builder::new_current_thread()
			.build()
			.unwrap();
		let handle = runtime.handle().clone();
		drop(runtime);

		let transport = Arc::new(MockTransport::new(true));
		let storage = Arc::new(MemoryStorage::new());
		let pipeline = DeliveryPipeline::new(
			Arc::clone(&transport) as Arc<dyn Transport>,
			Arc::clone(&storage) as Arc<dyn Storage>,
			handle,
		);

		let observed = Arc::new(Mutex::new(None));
		let sink = Arc::clone(&observed);
		let completion: Completion = Box::new(move |delivered| {
			*sink.lock().unwrap() = Some(delivered);
		});
		let _ = pipeline.dispatch(Event::new("lost", Level::Error), Some(completion));

		assert_eq!(*observed.lock().unwrap(), Some(false));
		assert_eq!(storage.len(), 1);
		assert_eq!(transport.attempts.load(Ordering::SeqCst), 0);
		let saved = tokio::runtime::Builder::new_current_thread()
			.build()
			.unwrap()
			.block_on(storage.list_saved())
			.unwrap();
		let body: serde_json::Value = serde_json::from_slice(&saved[0].data).unwrap();
		assert_eq!(body["message"], "lost");
	}

	#[tokio::test]
	async fn test_ready_handle_resolves_immediately() {
		assert!(!CaptureHandle::ready(false).wait().await);
		assert!(CaptureHandle::ready(true).wait().await);
	}
}
