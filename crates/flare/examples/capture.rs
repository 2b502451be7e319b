// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: capture events with the flare SDK.
//!
//! Run with:
//!   FLARE_DSN=https://key@errors.example.com/1 RUST_LOG=flare=debug \
//!     cargo run --example capture -p flare

use std::sync::Arc;

use flare::{
	source_location, Breadcrumb, BreadcrumbLevel, Client, FileStorage, Level, PanicReporter, User,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let Some(client) = Client::from_env()? else {
		println!("FLARE_DSN is not set, nothing to do");
		return Ok(());
	};

	println!("Initialized client");
	println!("  Store URL: {}", client.dsn().store_url());

	if let Some(report) = client.wait_for_startup_drain().await {
		println!("  Resent {} saved event(s), {} still pending", report.sent, report.failed);
	}

	// Crash reports go where the client resends from.
	let crash_storage = match &client.config().cache_dir {
		Some(dir) => FileStorage::in_dir(dir),
		None => FileStorage::from_cache_dir()?,
	};
	client.set_crash_handler(Arc::new(PanicReporter::new(crash_storage)));

	client.set_user(User {
		id: Some("user_example_123".to_string()),
		email: Some("example@example.com".to_string()),
		..Default::default()
	});
	client.set_release(Some("0.1.0-example".to_string()));
	client.set_tag("example", true)?;
	client.set_extra("rust_version", "1.85.0");

	client.record_breadcrumb(Breadcrumb::new("startup", "Application started"));
	client.record_breadcrumb(
		Breadcrumb::new("http", "GET /api/data failed")
			.with_level(BreadcrumbLevel::Warning)
			.with_data("status", 503),
	);

	println!("\nCapturing message...");
	let delivered = client
		.capture_message("Example message from flare", Level::Info)
		.wait()
		.await;
	println!("  Delivered: {delivered}");

	println!("\nCapturing error...");
	let error = std::fs::read("/definitely/missing/config.toml").unwrap_err();
	let delivered = client.capture_error(&error, source_location!()).wait().await;
	println!("  Delivered: {delivered}");
	if !delivered {
		println!("  Saved for the next run");
	}

	client.shutdown();
	Ok(())
}
