use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use warp::Filter;

lazy_static! {
	pub static ref REGISTRY: Registry = Registry::new();
	pub static ref VOTES_ACCEPTED: IntCounterVec =
		IntCounterVec::new(Opts::new("reveal_votes_accepted_total", "Votes accepted by outcome"), &["outcome"]).unwrap();
	pub static ref CHAT_MESSAGES_ACCEPTED: IntCounter =
		IntCounter::new("reveal_chat_messages_accepted_total", "Chat messages accepted").unwrap();
	pub static ref SESSIONS_FINALIZED: IntCounter =
		IntCounter::new("reveal_sessions_finalized_total", "Sessions that reached ENDED").unwrap();
	pub static ref ACTIVE_SESSIONS: IntGauge =
		IntGauge::new("reveal_active_sessions", "Sessions currently tracked by the Active Session Registry").unwrap();
}

/// Registers every collector once, at process start. Panics on duplicate
/// registration, which would indicate a programming error, not a runtime
/// condition.
pub fn register() {
	REGISTRY.register(Box::new(VOTES_ACCEPTED.clone())).expect("metric registration");
	REGISTRY.register(Box::new(CHAT_MESSAGES_ACCEPTED.clone())).expect("metric registration");
	REGISTRY.register(Box::new(SESSIONS_FINALIZED.clone())).expect("metric registration");
	REGISTRY.register(Box::new(ACTIVE_SESSIONS.clone())).expect("metric registration");
}

pub fn route() -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
	warp::path("metrics").and(warp::get()).map(|| {
		let encoder = TextEncoder::new();
		let metric_families = REGISTRY.gather();
		let mut buffer = Vec::new();
		encoder.encode(&metric_families, &mut buffer).expect("metric encoding");
		warp::reply::with_header(buffer, "Content-Type", encoder.format_type())
	})
}
