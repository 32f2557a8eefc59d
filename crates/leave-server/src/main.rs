// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Leave management server binary.

use axum::http::{header, HeaderValue, Method};
use clap::Parser;
use leave_server::{create_app_state, create_router, AppServices};
use leave_server_config::LogFormat;
use std::path::PathBuf;
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Leave server - HTTP API for leave requests.
#[derive(Parser, Debug)]
#[command(name = "leave-server", about = "Leave management server", version)]
struct Args {
	/// Configuration file. Defaults to /etc/leave/server.toml.
	#[arg(long, short, env = "LEAVE_SERVER_CONFIG")]
	config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => leave_server_config::load_config_with_file(path)?,
		None => leave_server_config::load_config()?,
	};

	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);
	match config.logging.format {
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.init(),
	}

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		environment = %config.auth.environment,
		"starting leave-server"
	);
	if config.smtp.is_none() {
		tracing::warn!("SMTP not configured; emails will be written to the log");
	}

	let pool = leave_server_db::create_pool(&config.database.url).await?;
	leave_server_db::run_migrations(&pool).await?;

	let state = create_app_state(pool, &config, AppServices::from_config(&config)).await?;
	let scheduler = state.scheduler.clone();

	if let Err(e) = scheduler.start().await {
		tracing::error!(error = %e, "Failed to start job scheduler");
	}

	let cors = CorsLayer::new()
		.allow_origin(AllowOrigin::exact(HeaderValue::from_str(&config.http.cors_origin)?))
		.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
		.allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
		.allow_credentials(true);

	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(cors);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Shutting down job scheduler...");
	scheduler.shutdown().await;
	tracing::info!("Server shutdown complete");
	Ok(())
}
