use std::{convert::Infallible, sync::Arc};

use chrono::{DateTime, Utc};
use reveal_core::{
	model::{Outcome, Session, Status},
	SessionRepository,
};
use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use crate::AppState;

/// A typed, recoverable rejection carrying its own HTTP status.
#[derive(Debug)]
struct ResponseError {
	status: StatusCode,
	message: String,
}

impl warp::reject::Reject for ResponseError {}

impl ResponseError {
	fn new(status: StatusCode, message: impl Into<String>) -> Rejection {
		warp::reject::custom(Self { status, message: message.into() })
	}
}

#[derive(Debug, Deserialize)]
struct CreateReveal {
	owner_id: String,
	gender: String,
	reveal_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRevealResponse {
	session_id: String,
	status: &'static str,
	reveal_time: DateTime<Utc>,
	created_at: DateTime<Utc>,
	shareable_link: String,
	gender: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionSummary {
	session_id: String,
	status: &'static str,
	reveal_time: DateTime<Utc>,
	created_at: DateTime<Utc>,
	revealed_gender: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct SessionStateQuery {
	#[serde(rename = "visitorId")]
	visitor_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoteCountView {
	boy: u64,
	girl: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionStateResponse {
	session_id: String,
	status: &'static str,
	reveal_time: DateTime<Utc>,
	votes: VoteCountView,
	recent_votes: Vec<reveal_core::model::VoteRecord>,
	recent_messages: Vec<reveal_core::model::ChatMessage>,
	has_voted: bool,
	revealed_gender: Option<&'static str>,
}

fn status_str(status: Status) -> &'static str {
	match status {
		Status::Waiting => "waiting",
		Status::Live => "live",
		Status::Ended => "ended",
	}
}

fn with_state(state: Arc<AppState>) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
	warp::any().map(move || state.clone())
}

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
	let create = warp::path!("api" / "reveals")
		.and(warp::post())
		.and(warp::body::json())
		.and(with_state(state.clone()))
		.and_then(create_reveal);

	let get_summary =
		warp::path!("api" / "reveals" / String).and(warp::get()).and(with_state(state.clone())).and_then(get_reveal_summary);

	let get_state = warp::path!("api" / "session" / String / "state")
		.and(warp::get())
		.and(warp::query::<SessionStateQuery>())
		.and(with_state(state))
		.and_then(get_session_state);

	create.or(get_summary).or(get_state)
}

async fn create_reveal(body: CreateReveal, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
	let outcome = Outcome::parse(&body.gender).ok_or_else(|| ResponseError::new(StatusCode::BAD_REQUEST, "gender must be \"boy\" or \"girl\""))?;

	if body.reveal_time <= Utc::now() {
		return Err(ResponseError::new(StatusCode::BAD_REQUEST, "revealTime must be in the future"));
	}

	let session_id = uuid::Uuid::new_v4().to_string();
	let created_at = Utc::now();
	let session = Session::new(session_id.clone(), body.owner_id, outcome, body.reveal_time, created_at);

	state.repository.save_session(&session).await.map_err(|e| ResponseError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
	state.repository.init_votes(&session_id).await.map_err(|e| ResponseError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
	state.registry.register(session_id.clone());

	let shareable_link = format!("{}/reveal/{}", state.settings.base_url, session_id);

	Ok(warp::reply::with_status(
		warp::reply::json(&CreateRevealResponse {
			session_id,
			status: status_str(Status::Waiting),
			reveal_time: session.reveal_time,
			created_at,
			shareable_link,
			gender: None,
		}),
		StatusCode::CREATED,
	))
}

async fn get_reveal_summary(session_id: String, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
	if let Some(session) = state.repository.get_session(&session_id).await.map_err(|e| ResponseError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?
	{
		return Ok(warp::reply::json(&SessionSummary {
			session_id: session.session_id.clone(),
			status: status_str(session.status),
			reveal_time: session.reveal_time,
			created_at: session.created_at,
			revealed_gender: session.visible_outcome().map(|o| o.as_str()),
		}));
	}

	// Not in the cache tier; the session may simply have aged out of the
	// post-reveal TTL, so fall back to its archived document before 404ing.
	let archived = state.archive.read(&session_id).await.map_err(|e| ResponseError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
	match archived {
		Some(archive) => Ok(warp::reply::json(&SessionSummary {
			session_id: archive.session_id,
			status: status_str(Status::Ended),
			reveal_time: archive.reveal_time,
			created_at: archive.created_at,
			revealed_gender: Some(archive.outcome.as_str()),
		})),
		None => Err(ResponseError::new(StatusCode::NOT_FOUND, "session not found")),
	}
}

async fn get_session_state(session_id: String, query: SessionStateQuery, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
	let session = load_session_or_404(&state.repository, &session_id).await?;

	let votes = state.repository.get_votes(&session_id).await.map_err(|e| ResponseError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
	let recent_votes =
		state.repository.get_recent_votes(&session_id, 50).await.map_err(|e| ResponseError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
	let recent_messages =
		state.repository.get_recent_chat(&session_id, 50).await.map_err(|e| ResponseError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
	let has_voted = match &query.visitor_id {
		Some(voter_id) => {
			state.repository.has_voted(&session_id, voter_id).await.map_err(|e| ResponseError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?
		},
		None => false,
	};

	Ok(warp::reply::json(&SessionStateResponse {
		session_id: session.session_id.clone(),
		status: status_str(session.status),
		reveal_time: session.reveal_time,
		votes: VoteCountView { boy: votes.count_a, girl: votes.count_b },
		recent_votes,
		recent_messages,
		has_voted,
		revealed_gender: session.visible_outcome().map(|o| o.as_str()),
	}))
}

async fn load_session_or_404(repository: &SessionRepository, session_id: &str) -> Result<Session, Rejection> {
	repository
		.get_session(session_id)
		.await
		.map_err(|e| ResponseError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?
		.ok_or_else(|| ResponseError::new(StatusCode::NOT_FOUND, "session not found"))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	message: String,
}

pub async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
	if rejection.is_not_found() {
		return Ok(warp::reply::with_status(warp::reply::json(&ErrorBody { message: "not found".to_string() }), StatusCode::NOT_FOUND));
	}
	if let Some(error) = rejection.find::<ResponseError>() {
		return Ok(warp::reply::with_status(warp::reply::json(&ErrorBody { message: error.message.clone() }), error.status));
	}
	if rejection.find::<warp::filters::body::BodyDeserializeError>().is_some() {
		return Ok(warp::reply::with_status(
			warp::reply::json(&ErrorBody { message: "invalid request body".to_string() }),
			StatusCode::BAD_REQUEST,
		));
	}
	Ok(warp::reply::with_status(warp::reply::json(&ErrorBody { message: "internal error".to_string() }), StatusCode::INTERNAL_SERVER_ERROR))
}
