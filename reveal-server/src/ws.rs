use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use reveal_core::{chat_engine::ChatOutcome, model::Choice, vote_engine::VoteOutcome};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use warp::{ws::Message, ws::WebSocket, Filter, Rejection, Reply};

use crate::AppState;

/// Inbound client frame, tagged by `channel` (spec §6 realtime surface).
#[derive(Debug, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
enum ClientFrame {
	Vote {
		option: String,
		#[serde(rename = "visitorId")]
		visitor_id: String,
		#[serde(default)]
		name: String,
	},
	Chat {
		name: String,
		message: String,
		#[serde(rename = "visitorId")]
		visitor_id: String,
	},
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoteResponsePayload {
	success: bool,
	message: String,
}

const OUTBOUND_TOPICS: [&str; 3] = ["votes", "vote-events", "chat"];

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
	warp::path!("ws" / String).and(warp::ws()).map(move |session_id: String, ws: warp::ws::Ws| {
		let state = state.clone();
		ws.on_upgrade(move |socket| handle_connection(socket, session_id, state))
	})
}

async fn handle_connection(socket: WebSocket, session_id: String, state: Arc<AppState>) {
	let (mut sink, mut stream) = socket.split();
	let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(64);

	// One forwarding task per topic this session cares about; each mirrors
	// its `tokio::sync::broadcast` subscription into the connection's own
	// mpsc queue so the websocket sink only ever sees one writer.
	let mut forwarders = Vec::with_capacity(OUTBOUND_TOPICS.len());
	for topic in OUTBOUND_TOPICS {
		let full_topic = format!("{topic}/{session_id}");
		let mut receiver = state.publisher.subscribe(&full_topic);
		let tx = outbound_tx.clone();
		forwarders.push(tokio::spawn(async move {
			loop {
				match receiver.recv().await {
					Ok(payload) => {
						let envelope = serde_json::json!({ "topic": full_topic, "data": serde_json::from_str::<serde_json::Value>(&payload).unwrap_or(serde_json::Value::String(payload)) });
						if tx.send(envelope.to_string()).await.is_err() {
							break;
						}
					},
					Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
						info!(topic = %full_topic, skipped, "websocket forwarder lagged, resynchronizing");
					},
					Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
				}
			}
		}));
	}
	// Kept alive across the read loop so `ack()` can push replies to this
	// connection only, without round-tripping through the shared publisher.
	let ack_tx = outbound_tx.clone();
	drop(outbound_tx);

	let writer_task = tokio::spawn(async move {
		while let Some(frame) = outbound_rx.recv().await {
			if sink.send(Message::text(frame)).await.is_err() {
				break;
			}
		}
	});

	while let Some(message) = stream.next().await {
		let message = match message {
			Ok(message) => message,
			Err(error) => {
				warn!(%error, session_id = %session_id, "websocket read error");
				break;
			},
		};
		if !message.is_text() {
			continue;
		}
		let Ok(text) = message.to_str() else { continue };
		handle_client_frame(text, &session_id, &state, &ack_tx).await;
	}

	for forwarder in forwarders {
		forwarder.abort();
	}
	writer_task.abort();
}

async fn handle_client_frame(text: &str, session_id: &str, state: &Arc<AppState>, ack_tx: &mpsc::Sender<String>) {
	let frame: ClientFrame = match serde_json::from_str(text) {
		Ok(frame) => frame,
		Err(error) => {
			warn!(%error, "discarding malformed websocket frame");
			return;
		},
	};

	match frame {
		ClientFrame::Vote { option, visitor_id, name } => {
			let Some(choice) = Choice::parse(&option) else {
				ack(ack_tx, session_id, false, "invalid choice").await;
				return;
			};
			match state.vote_engine.cast_vote(session_id, choice, &visitor_id, &name).await {
				Ok(VoteOutcome::Ok) => {
					crate::metrics::VOTES_ACCEPTED.with_label_values(&["ok"]).inc();
					ack(ack_tx, session_id, true, "vote accepted").await;
				},
				Ok(VoteOutcome::RateLimited) => ack(ack_tx, session_id, false, "rate limited").await,
				Ok(VoteOutcome::NotFound) => ack(ack_tx, session_id, false, "session not found").await,
				Ok(VoteOutcome::Ended) => ack(ack_tx, session_id, false, "session has ended").await,
				Ok(VoteOutcome::AlreadyVoted) => ack(ack_tx, session_id, false, "already voted").await,
				Err(error) => {
					warn!(%error, session_id = %session_id, "vote admission failed");
					ack(ack_tx, session_id, false, "try again").await;
				},
			}
		},
		ClientFrame::Chat { name, message, visitor_id } => match state.chat_engine.send_message(session_id, &name, &message, &visitor_id).await {
			Ok(ChatOutcome::Ok) => {
				crate::metrics::CHAT_MESSAGES_ACCEPTED.inc();
				ack(ack_tx, session_id, true, "message sent").await;
			},
			Ok(ChatOutcome::RateLimited) => ack(ack_tx, session_id, false, "rate limited").await,
			Ok(ChatOutcome::Rejected) => ack(ack_tx, session_id, false, "message rejected").await,
			Err(error) => {
				warn!(%error, session_id = %session_id, "chat admission failed");
				ack(ack_tx, session_id, false, "try again").await;
			},
		},
	}
}

/// Personal acknowledgment, delivered only to the connection that sent the
/// frame. Unlike `votes`/`vote-events`/`chat`, `vote-response` is never
/// fanned out through the shared per-session publisher — other clients on
/// the same session must never see it.
async fn ack(ack_tx: &mpsc::Sender<String>, session_id: &str, success: bool, message: &str) {
	let payload = VoteResponsePayload { success, message: message.to_string() };
	let envelope = serde_json::json!({
		"topic": format!("vote-response/{session_id}"),
		"data": payload,
	});
	let _ = ack_tx.send(envelope.to_string()).await;
}
