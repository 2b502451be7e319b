// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! On-disk queue of events whose delivery failed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::error::{FlareError, Result};

const EVENT_EXTENSION: &str = "json";

/// A serialized event waiting to be resent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedEvent {
	/// Stable handle used to delete the record after a successful resend.
	pub id: String,
	pub data: Vec<u8>,
}

/// Persistence collaborator for undelivered events.
#[async_trait]
pub trait Storage: Send + Sync {
	/// All saved events, oldest first.
	async fn list_saved(&self) -> Result<Vec<PersistedEvent>>;

	/// Saves a serialized event and returns its handle.
	async fn save(&self, data: &[u8]) -> Result<String>;

	/// Deletes a saved event.
	async fn delete(&self, id: &str) -> Result<()>;

	/// Saves without a runtime, for panic hooks and delivery tasks dropped
	/// by a runtime that is shutting down.
	fn save_blocking(&self, data: &[u8]) -> Result<String>;
}

fn new_record_id() -> String {
	uuid7::uuid7().to_string()
}

/// Stores one file per event in a directory.
///
/// File names are UUID v7 values, so lexical order is creation order.
#[derive(Debug, Clone)]
pub struct FileStorage {
	events_dir: PathBuf,
}

impl FileStorage {
	pub fn new(events_dir: impl Into<PathBuf>) -> Self {
		Self {
			events_dir: events_dir.into(),
		}
	}

	/// Storage under the platform cache directory (`<cache>/flare/events`).
	pub fn from_cache_dir() -> Result<Self> {
		let cache_dir = dirs::cache_dir().ok_or_else(|| {
			FlareError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				"could not determine cache directory",
			))
		})?;
		Ok(Self::in_dir(&cache_dir))
	}

	/// Storage under `<dir>/flare/events`.
	pub fn in_dir(dir: &Path) -> Self {
		Self::new(dir.join("flare").join("events"))
	}

	pub fn events_dir(&self) -> &Path {
		&self.events_dir
	}

	fn event_path(&self, id: &str) -> PathBuf {
		self.events_dir.join(format!("{id}.{EVENT_EXTENSION}"))
	}

	fn paths(&self, id: &str) -> (PathBuf, PathBuf) {
		let path = self.event_path(id);
		let tmp_path = self.events_dir.join(format!("{id}.{EVENT_EXTENSION}.tmp"));
		(path, tmp_path)
	}
}

#[async_trait]
impl Storage for FileStorage {
	async fn list_saved(&self) -> Result<Vec<PersistedEvent>> {
		if !tokio::fs::try_exists(&self.events_dir).await? {
			return Ok(Vec::new());
		}

		let mut entries = tokio::fs::read_dir(&self.events_dir).await?;
		let mut ids = Vec::new();

		while let Some(entry) = entries.next_entry().await? {
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some(EVENT_EXTENSION) {
				continue;
			}
			if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
				ids.push(stem.to_string());
			}
		}
		ids.sort();

		let mut saved = Vec::with_capacity(ids.len());
		for id in ids {
			let path = self.event_path(&id);
			match tokio::fs::read(&path).await {
				Ok(data) => saved.push(PersistedEvent { id, data }),
				Err(e) => {
					error!(
						path = %path.display(),
						error = %e,
						"failed to read saved event"
					);
				}
			}
		}

		debug!(count = saved.len(), "listed saved events");
		Ok(saved)
	}

	async fn save(&self, data: &[u8]) -> Result<String> {
		tokio::fs::create_dir_all(&self.events_dir).await?;

		let id = new_record_id();
		let (path, tmp_path) = self.paths(&id);
		tokio::fs::write(&tmp_path, data).await?;
		tokio::fs::rename(&tmp_path, &path).await?;

		debug!(record_id = %id, path = %path.display(), "saved event to disk");
		Ok(id)
	}

	async fn delete(&self, id: &str) -> Result<()> {
		let path = self.event_path(id);
		match tokio::fs::remove_file(&path).await {
			Ok(()) => {
				info!(record_id = %id, "deleted saved event");
				Ok(())
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Err(FlareError::NotFound(id.to_string()))
			}
			Err(e) => Err(e.into()),
		}
	}

	fn save_blocking(&self, data: &[u8]) -> Result<String> {
		std::fs::create_dir_all(&self.events_dir)?;

		let id = new_record_id();
		let (path, tmp_path) = self.paths(&id);
		std::fs::write(&tmp_path, data)?;
		std::fs::rename(&tmp_path, &path)?;

		debug!(record_id = %id, path = %path.display(), "saved event to disk");
		Ok(id)
	}
}

/// Keeps undelivered events in memory only. They do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	events: Mutex<Vec<PersistedEvent>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PersistedEvent>> {
		self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

#[async_trait]
impl Storage for MemoryStorage {
	async fn list_saved(&self) -> Result<Vec<PersistedEvent>> {
		Ok(self.lock().clone())
	}

	async fn save(&self, data: &[u8]) -> Result<String> {
		self.save_blocking(data)
	}

	async fn delete(&self, id: &str) -> Result<()> {
		let mut events = self.lock();
		let before = events.len();
		events.retain(|event| event.id != id);
		if events.len() == before {
			return Err(FlareError::NotFound(id.to_string()));
		}
		Ok(())
	}

	fn save_blocking(&self, data: &[u8]) -> Result<String> {
		let id = new_record_id();
		self.lock().push(PersistedEvent {
			id: id.clone(),
			data: data.to_vec(),
		});
		Ok(id)
	}
}
