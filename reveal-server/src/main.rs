mod health;
mod http;
mod metrics;
mod publisher;
mod settings;
mod ws;

use std::sync::Arc;

use clap::Parser;
use reveal_core::{
	ActiveSessionRegistry, BroadcastScheduler, ChatEngine, FileArchiveSink, LifecycleController, RateLimiter, RedisCacheStore, RuntimeConfig,
	SessionRepository, VoteEngine,
};
use tracing::info;
use warp::Filter;

use crate::{publisher::BroadcastPublisher, settings::RevealServerSettings};

pub struct AppState {
	pub repository: Arc<SessionRepository>,
	pub registry: Arc<ActiveSessionRegistry>,
	pub vote_engine: Arc<VoteEngine>,
	pub chat_engine: Arc<ChatEngine>,
	pub publisher: Arc<BroadcastPublisher>,
	pub archive: Arc<dyn reveal_core::ArchiveSink>,
	pub settings: RevealServerSettings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let subscriber = tracing_subscriber::FmtSubscriber::builder().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).finish();
	tracing::subscriber::set_global_default(subscriber)?;

	let cli = settings::CommandLineOptions::parse();
	let settings = settings::load(cli)?;
	let config: RuntimeConfig = settings.runtime_config();

	metrics::register();

	let cache_store = Arc::new(RedisCacheStore::connect(&settings.redis_url).await?);
	let repository = Arc::new(SessionRepository::new(cache_store.clone(), config.clone()));
	let registry = Arc::new(ActiveSessionRegistry::new());
	let publisher = Arc::new(BroadcastPublisher::new());
	let rate_limiter = Arc::new(RateLimiter::new(cache_store.clone(), config.rate_limit_window()));
	let archive: Arc<dyn reveal_core::ArchiveSink> = Arc::new(FileArchiveSink::new(settings.archive_path.clone()));

	let vote_engine = Arc::new(VoteEngine::new(repository.clone(), rate_limiter.clone(), publisher.clone(), config.name_max_length));
	let chat_engine =
		Arc::new(ChatEngine::new(repository.clone(), rate_limiter.clone(), publisher.clone(), config.name_max_length, config.chat_max_length));

	// Rehydrate the in-process registry from the cache store's ActiveSessionSet
	// so a restart picks up sessions that were already live.
	registry.reconcile(&repository).await?;
	metrics::ACTIVE_SESSIONS.set(registry.snapshot().len() as i64);

	let lifecycle = Arc::new(LifecycleController::new(
		repository.clone(),
		registry.clone(),
		publisher.clone(),
		archive.clone(),
		config.activation_lead,
		config.chat_max_messages,
		Arc::new(|| metrics::SESSIONS_FINALIZED.inc()),
	));
	let broadcast_scheduler = Arc::new(BroadcastScheduler::new(repository.clone(), registry.clone(), publisher.clone()));

	tokio::spawn(lifecycle.run(config.lifecycle_tick_interval()));
	tokio::spawn(broadcast_scheduler.run(config.broadcast_interval()));
	tokio::spawn(reconcile_loop(repository.clone(), registry.clone(), config.registry_reconcile_interval()));

	let state = Arc::new(AppState { repository, registry, vote_engine, chat_engine, publisher, archive, settings: settings.clone() });

	let cors = build_cors(&settings.cors_allowed_origins);
	let routes = http::routes(state.clone())
		.or(ws::routes(state))
		.or(health::route())
		.or(metrics::route())
		.recover(http::handle_rejection)
		.with(cors);

	let bind_address: std::net::SocketAddr = settings.bind_address.parse()?;
	let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
	let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(bind_address, async {
		shutdown_rx.await.ok();
	});

	info!(%bind_address, "reveal-server listening");

	tokio::select! {
		_ = server => {},
		_ = shutdown_signal() => {
			info!("shutdown signal received");
			let _ = shutdown_tx.send(());
		},
	}

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = tokio::signal::ctrl_c();
	let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
		.expect("failed to install SIGTERM handler");
	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate.recv() => {},
	}
}

/// Every 60s (spec §4.E), outside the registry's own reconcile() so the
/// scheduling policy lives with the process rather than inside the type.
async fn reconcile_loop(repository: Arc<SessionRepository>, registry: Arc<ActiveSessionRegistry>, interval: std::time::Duration) {
	let mut ticker = tokio::time::interval(interval);
	ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
	loop {
		ticker.tick().await;
		if let Err(error) = registry.reconcile(&repository).await {
			tracing::error!(%error, "registry reconcile failed");
		}
		metrics::ACTIVE_SESSIONS.set(registry.snapshot().len() as i64);
	}
}

fn build_cors(allowed_origins: &[String]) -> warp::cors::Builder {
	let mut cors = warp::cors().allow_methods(["GET", "POST"]).allow_headers(["content-type"]);
	if allowed_origins.is_empty() {
		cors = cors.allow_any_origin();
	} else {
		for origin in allowed_origins {
			cors = cors.allow_origin(origin.as_str());
		}
	}
	cors
}
